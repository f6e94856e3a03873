use crate::stats::{Accumulator, TimeSeries};
use crate::summary::Summary;
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Quantity measured on every published summary.
pub trait Obs {
    fn update(&mut self, summary: &Summary);
    fn report(&self) -> serde_json::Value;
}

/// Time series of a scalar summary field.
///
/// Summaries for which the field is undefined (an average over nobody) are
/// skipped.
pub struct Scalar {
    name: &'static str,
    extract: fn(&Summary) -> Option<f64>,
    time_series: TimeSeries,
}

impl Scalar {
    pub fn new(name: &'static str, extract: fn(&Summary) -> Option<f64>) -> Self {
        Self {
            name,
            extract,
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for Scalar {
    fn update(&mut self, summary: &Summary) {
        if let Some(val) = (self.extract)(summary) {
            self.time_series.push(val);
        }
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ (self.name): self.time_series.report() })
    }
}

/// Number of live agents with each role.
pub struct RoleCounts {
    acc_vec: [Accumulator; 3],
}

impl RoleCounts {
    pub fn new() -> Self {
        Self {
            acc_vec: std::array::from_fn(|_| Accumulator::new()),
        }
    }
}

impl Obs for RoleCounts {
    fn update(&mut self, summary: &Summary) {
        let counts = [
            summary.num_creators,
            summary.num_listeners,
            summary.num_organizers,
        ];
        for (acc, count) in self.acc_vec.iter_mut().zip(counts) {
            acc.add(count as f64);
        }
    }

    fn report(&self) -> serde_json::Value {
        let [creators, listeners, organizers] = &self.acc_vec;
        serde_json::json!({
            "role_counts": {
                "creators": creators.report(),
                "listeners": listeners.report(),
                "organizers": organizers.report(),
            }
        })
    }
}

/// Iteration at which the population died out, if it did.
pub struct Extinction {
    iteration: Option<usize>,
}

impl Obs for Extinction {
    fn update(&mut self, summary: &Summary) {
        if self.iteration.is_none() && summary.num_population == 0 {
            self.iteration = Some(summary.iteration);
        }
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "extinction": self.iteration })
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Scalar::new("num_population", |s| {
                Some(s.num_population as f64)
            })),
            Box::new(Scalar::new("total_energy", |s| Some(s.total_energy))),
            Box::new(Scalar::new("avg_evaluation", |s| {
                (s.num_evaluation_this > 0).then_some(s.avg_evaluation)
            })),
            Box::new(Scalar::new("avg_innovation", |s| {
                (s.num_creators > 0).then_some(s.avg_innovation)
            })),
            Box::new(Scalar::new("avg_novelty_preference", |s| {
                (s.num_listeners > 0).then_some(s.avg_novelty_preference)
            })),
            Box::new(RoleCounts::new()),
            Box::new(Extinction { iteration: None }),
        ];
        Self { obs_ptr_vec }
    }

    pub fn add_summary(&mut self, summary: &Summary) {
        for obs in &mut self.obs_ptr_vec {
            obs.update(summary);
        }
    }

    /// Feed every summary stored in a MessagePack summaries file.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file);

        let summaries: Vec<Summary> =
            decode::from_read(reader).context("failed to deserialize summaries")?;
        for summary in &summaries {
            self.add_summary(summary);
        }
        Ok(())
    }

    pub fn report(&self) -> Vec<serde_json::Value> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.report())
            .context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::simulation::Simulation;

    #[test]
    fn reports_every_observable() {
        let mut cfg = Config::default();
        cfg.simulation.n_agents = 20;
        cfg.simulation.n_iter = 16;
        cfg.simulation.seed = Some(25);
        let mut sim = Simulation::from_config(&cfg).unwrap();
        sim.run();

        let mut analyzer = Analyzer::new();
        for summary in sim.summaries() {
            analyzer.add_summary(summary);
        }
        let report = analyzer.report();
        assert_eq!(report.len(), 7);
        assert!(report[0]["num_population"]["mean"].is_number());
        assert!(report[5]["role_counts"]["creators"]["n_vals"].as_u64().unwrap() > 0);
    }

    #[test]
    fn averages_skip_iterations_without_samples() {
        let mut analyzer = Analyzer::new();
        analyzer.add_summary(&Summary::default());
        for _ in 0..3 {
            let mut summary = Summary::default();
            summary.record_evaluation(0.6);
            summary.calculate(&[]);
            analyzer.add_summary(&summary);
        }

        let report = analyzer.report();
        let avg_evaluation = &report[2]["avg_evaluation"];
        assert!((avg_evaluation["mean"].as_f64().unwrap() - 0.6).abs() < 1e-12);
        assert!(report[3]["avg_innovation"]["mean"].is_null());
        assert_eq!(report[0]["num_population"]["mean"], 0.0);
    }

    #[test]
    fn extinction_is_detected_once() {
        let mut obs = Extinction { iteration: None };
        let mut summary = Summary::default();
        summary.num_population = 3;
        obs.update(&summary);
        summary.iteration = 4;
        summary.num_population = 0;
        obs.update(&summary);
        summary.iteration = 5;
        obs.update(&summary);
        assert_eq!(obs.report(), serde_json::json!({ "extinction": 4 }));
    }

    #[test]
    fn role_counts_average_over_summaries() {
        let mut obs = RoleCounts::new();
        obs.update(&Summary::default());
        let mut summary = Summary::default();
        summary.num_population = 4;
        summary.num_creators = 1;
        summary.num_listeners = 2;
        summary.num_organizers = 4;
        obs.update(&summary);
        let report = obs.report();
        assert_eq!(report["role_counts"]["creators"]["n_vals"], 2);
        assert_eq!(report["role_counts"]["listeners"]["mean"], 1.0);
        assert_eq!(report["role_counts"]["organizers"]["mean"], 2.0);
    }
}
