use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub genetic: GeneticConfig,
    pub agent: AgentConfig,
    pub organizer: OrganizerConfig,
}

/// Population scheduling parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of founder agents.
    pub n_agents: usize,
    /// Number of iterations.
    pub n_iter: usize,
    /// Dimension of the genre space.
    pub genre_dim: usize,
    /// Random number generator seed (seeded from the OS if absent).
    pub seed: Option<u64>,
}

/// Genetic algorithm parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Probability that a gene component mutates.
    pub mutation_rate: f64,
    /// Maximum magnitude of a mutation.
    pub mutation_strength: f64,
}

/// Experiment constants shared by every agent.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Energy of a newly created agent.
    pub default_energy: f64,
    /// Kept for reference; culling uses `energy <= 0`.
    pub elimination_threshold: f64,
    /// Energy spent to create a song.
    pub creation_cost: f64,
    /// Energy spent to evaluate a song.
    pub evaluation_cost: f64,
}

/// Experiment constants of the organizer role.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct OrganizerConfig {
    /// Probability that a convened event is major.
    pub major_probability: f64,
    /// Energy spent to convene an event.
    pub organization_cost: f64,
    /// Fraction of the owed rewards kept by the organizer.
    pub fee_rate: f64,
    pub major: MajorEventConfig,
    pub minor: MinorEventConfig,
}

/// Sampling and reward ratios of major events.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct MajorEventConfig {
    pub listener_ratio: f64,
    pub creator_ratio: f64,
    pub song_ratio: f64,
    /// Fraction of the ranked songs receiving the bonus.
    pub winner_ratio: f64,
    /// Fraction of the post-fee pool paid as bonus.
    pub reward_ratio: f64,
}

/// Sampling and reward ratios of minor events.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct MinorEventConfig {
    pub listener_ratio: f64,
    pub creator_ratio: f64,
    pub song_ratio: f64,
    /// Fraction of each song's post-fee reward returned to its creator.
    pub reward_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig {
                n_agents: 100,
                n_iter: 100,
                genre_dim: 2,
                seed: None,
            },
            genetic: GeneticConfig {
                mutation_rate: 0.1,
                mutation_strength: 0.05,
            },
            agent: AgentConfig {
                default_energy: 100.0,
                elimination_threshold: 0.0,
                creation_cost: 2.0,
                evaluation_cost: 2.0,
            },
            organizer: OrganizerConfig {
                major_probability: 0.5,
                organization_cost: 0.5,
                fee_rate: 0.2,
                major: MajorEventConfig {
                    listener_ratio: 0.5,
                    creator_ratio: 0.5,
                    song_ratio: 0.1,
                    winner_ratio: 0.5,
                    reward_ratio: 0.5,
                },
                minor: MinorEventConfig {
                    listener_ratio: 0.1,
                    creator_ratio: 0.1,
                    song_ratio: 0.5,
                    reward_ratio: 0.5,
                },
            },
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        check_num(sim.n_agents, 1..100_000).context("invalid number of agents")?;
        check_num(sim.n_iter, 1..100_000).context("invalid number of iterations")?;
        check_num(sim.genre_dim, 1..=64).context("invalid genre dimension")?;

        let genetic = &self.genetic;
        check_prob(genetic.mutation_rate).context("invalid mutation rate")?;
        check_num(genetic.mutation_strength, 0.0..=1.0).context("invalid mutation strength")?;

        let agt = &self.agent;
        check_num(agt.default_energy, f64::MIN_POSITIVE..1e12).context("invalid default energy")?;
        check_num(agt.elimination_threshold, -1e12..1e12)
            .context("invalid elimination threshold")?;
        check_num(agt.creation_cost, 0.0..1e12).context("invalid creation cost")?;
        check_num(agt.evaluation_cost, 0.0..1e12).context("invalid evaluation cost")?;

        let org = &self.organizer;
        check_prob(org.major_probability).context("invalid major event probability")?;
        check_num(org.organization_cost, 0.0..1e12).context("invalid organization cost")?;
        check_prob(org.fee_rate).context("invalid organization fee rate")?;

        let major = &org.major;
        check_prob(major.listener_ratio).context("invalid major listener ratio")?;
        check_prob(major.creator_ratio).context("invalid major creator ratio")?;
        check_prob(major.song_ratio).context("invalid major song ratio")?;
        check_prob(major.winner_ratio).context("invalid major winner ratio")?;
        check_prob(major.reward_ratio).context("invalid major reward ratio")?;

        let minor = &org.minor;
        check_prob(minor.listener_ratio).context("invalid minor listener ratio")?;
        check_prob(minor.creator_ratio).context("invalid minor creator ratio")?;
        check_prob(minor.song_ratio).context("invalid minor song ratio")?;
        check_prob(minor.reward_ratio).context("invalid minor reward ratio")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_prob(prob: f64) -> Result<()> {
    check_num(prob, 0.0..=1.0)
}
