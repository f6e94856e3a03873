use crate::agent::{self, Agent, Context};
use crate::config::Config;
use crate::event::Market;
use crate::gene::GaParams;
use crate::ids::{AgentId, IdIssuer};
use crate::song::SongRegistry;
use crate::summary::Summary;
use anyhow::{Context as _, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;

/// Population scheduler.
///
/// Owns the population, the open events, the id counters and the random
/// number generator, and records one [`Summary`] per iteration.
pub struct Simulation {
    n_iter: usize,
    population: Vec<Agent>,
    ga_params: GaParams,
    template: Agent,
    market: Market,
    songs: SongRegistry,
    agent_ids: IdIssuer<AgentId>,
    summaries: Vec<Summary>,
    rng: ChaCha12Rng,
}

impl Simulation {
    /// Create a new `Simulation` from a validated configuration.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let rng = match cfg.simulation.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng().context("failed to seed rng")?,
        };

        let ga_params = GaParams::new(cfg.genetic.mutation_rate, cfg.genetic.mutation_strength)
            .context("failed to construct genetic parameters")?;

        let template = Agent::template(&cfg.agent, &cfg.organizer, cfg.simulation.genre_dim);

        Ok(Self::new(
            cfg.simulation.n_agents,
            cfg.simulation.n_iter,
            ga_params,
            template,
            rng,
        ))
    }

    /// Create `n_agents` random founders from `template` and record the initial summary.
    pub fn new(
        n_agents: usize,
        n_iter: usize,
        ga_params: GaParams,
        template: Agent,
        mut rng: ChaCha12Rng,
    ) -> Self {
        let mut agent_ids = IdIssuer::new();
        let population: Vec<_> = (0..n_agents)
            .map(|_| Agent::random_founder(agent_ids.issue(), &template, &mut rng))
            .collect();

        let mut initial = Summary::default();
        initial.calculate(&population);

        let mut summaries = Vec::with_capacity(n_iter + 1);
        summaries.push(initial);

        Self {
            n_iter,
            population,
            ga_params,
            template,
            market: Market::new(),
            songs: SongRegistry::new(),
            agent_ids,
            summaries,
            rng,
        }
    }

    /// Run every remaining iteration.
    pub fn run(&mut self) {
        while !self.is_finished() {
            self.step();

            let progress = 100.0 * self.n_completed() as f64 / self.n_iter as f64;
            log::info!("completed {progress:06.2}%");
        }

        log::info!(
            "registered {} songs, {} events left open",
            self.songs.n_registered(),
            self.market.n_open()
        );
    }

    /// Perform a single iteration.
    pub fn step(&mut self) {
        self.cull();

        let mut summary = match self.summaries.last() {
            Some(prev) => Summary::carry_forward(prev),
            None => Summary::default(),
        };

        let newborns = self.act(&mut summary);

        // Newborn ids are larger than every live id, so the population stays sorted.
        self.population.extend(newborns);
        debug_assert!(self.population.is_sorted_by_key(Agent::id));

        summary.calculate(&self.population);
        log::debug!(
            "iteration {}: {} agents, {} songs, {} evaluations, {} events, {} born, energy {:.2}",
            summary.iteration,
            summary.num_population,
            summary.num_song_this,
            summary.num_evaluation_this,
            summary.num_event_this,
            summary.num_born_this,
            summary.total_energy
        );
        self.summaries.push(summary);
    }

    /// Remove agents without energy and the events they left open.
    fn cull(&mut self) {
        self.population.retain(Agent::is_alive);

        let population = &self.population;
        let n_dropped = self
            .market
            .drop_orphans(|id| population.binary_search_by_key(&id, Agent::id).is_ok());
        if n_dropped > 0 {
            log::debug!("dropped {n_dropped} events of culled organizers");
        }
    }

    /// Run every agent once and return the newborns.
    fn act(&mut self, summary: &mut Summary) -> Vec<Agent> {
        let mut newborns = Vec::new();
        let mut ctx = Context {
            market: &mut self.market,
            songs: &mut self.songs,
            agent_ids: &mut self.agent_ids,
            ga_params: &self.ga_params,
            template: &self.template,
            summary,
            newborns: &mut newborns,
        };

        for idx in 0..self.population.len() {
            agent::run(&mut self.population, idx, &mut ctx, &mut self.rng);
        }

        newborns
    }

    pub fn n_completed(&self) -> usize {
        self.summaries.len() - 1
    }

    pub fn is_finished(&self) -> bool {
        self.n_completed() >= self.n_iter
    }

    /// Published summaries, the initial state first.
    pub fn summaries(&self) -> &[Summary] {
        &self.summaries
    }
}

#[cfg(test)]
impl Simulation {
    pub fn population(&self) -> &[Agent] {
        &self.population
    }

    pub fn market(&self) -> &Market {
        &self.market
    }
}
