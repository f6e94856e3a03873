use crate::analysis::Analyzer;
use crate::config::Config;
use crate::simulation::Simulation;
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run a new simulation, optionally overriding the major event probability.
    pub fn create_run(&self, major_probability: Option<f64>) -> Result<()> {
        let mut cfg = self.cfg.clone();
        if let Some(prob) = major_probability {
            cfg.organizer.major_probability = prob;
            cfg.validate().context("failed to validate overridden cfg")?;
            log::info!("overrode major event probability with {prob}");
        }

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut sim = Simulation::from_config(&cfg).context("failed to construct simulation")?;
        sim.run();
        let summaries = sim.summaries();

        let file = self.summaries_file(run_idx);
        let mut writer = BufWriter::new(
            File::create(&file).with_context(|| format!("failed to create {file:?}"))?,
        );
        encode::write(&mut writer, summaries).context("failed to serialize summaries")?;
        writer.flush().context("failed to flush writer stream")?;
        log::info!("wrote {file:?}");

        let file = self.summaries_json_file(run_idx);
        let mut writer = BufWriter::new(
            File::create(&file).with_context(|| format!("failed to create {file:?}"))?,
        );
        serde_json::to_writer(&mut writer, summaries).context("failed to serialize summaries")?;
        writer.flush().context("failed to flush writer stream")?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new();

            analyzer
                .add_file(self.summaries_file(run_idx))
                .context("failed to add file")?;

            let file = self.results_file(run_idx);
            analyzer
                .save_results(&file)
                .context("failed to save results")?;
            log::info!("wrote {file:?}");
        }

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs()? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn summaries_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("summaries.msgpack")
    }

    fn summaries_json_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("summaries.json")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::Summary;
    use rmp_serde::decode;

    #[test]
    fn run_files_are_complete() {
        let sim_dir = std::env::temp_dir().join(format!("musl-sim-manager-{}", std::process::id()));
        fs::remove_dir_all(&sim_dir).ok();
        fs::create_dir_all(&sim_dir).unwrap();

        let mut cfg = Config::default();
        cfg.simulation.n_agents = 30;
        cfg.simulation.n_iter = 8;
        cfg.simulation.seed = Some(26);
        let mgr = Manager {
            sim_dir: sim_dir.clone(),
            cfg,
        };
        mgr.create_run(Some(0.2)).unwrap();

        let packed: Vec<Summary> =
            decode::from_slice(&fs::read(mgr.summaries_file(0)).unwrap()).unwrap();
        let json: Vec<Summary> =
            serde_json::from_slice(&fs::read(mgr.summaries_json_file(0)).unwrap()).unwrap();
        assert_eq!(packed.len(), 9);
        assert_eq!(json.len(), 9);
        for (packed, json) in packed.iter().zip(&json) {
            assert_eq!(packed.iteration, json.iteration);
            assert_eq!(packed.agent_ids, json.agent_ids);
            assert!((packed.total_energy - json.total_energy).abs() < 1e-9);
        }

        mgr.analyze_sim().unwrap();
        let results: serde_json::Value =
            serde_json::from_slice(&fs::read(mgr.results_file(0)).unwrap()).unwrap();
        assert_eq!(results.as_array().unwrap().len(), 7);

        mgr.clean_sim().unwrap();
        assert_eq!(mgr.count_run_dirs().unwrap(), 0);
        fs::remove_dir_all(&sim_dir).ok();
    }
}
