use crate::agent::{Agent, Role};
use crate::ids::{AgentId, SongId};
use serde::{Deserialize, Serialize};

/// Position of a song in the genre space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenrePoint {
    pub song_id: SongId,
    pub genre: Vec<f64>,
}

/// Snapshot of the simulation after an iteration.
///
/// `*_all` counters are cumulative, `*_this` counters cover one iteration.
/// Everything else is recomputed from the population by [`Summary::calculate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub iteration: usize,

    pub num_population: usize,
    pub num_creators: usize,
    pub num_listeners: usize,
    pub num_organizers: usize,

    pub num_song_all: usize,
    pub num_song_this: usize,
    pub num_song_now: usize,
    pub num_evaluation_all: usize,
    pub num_evaluation_this: usize,
    pub num_event_all: usize,
    pub num_event_this: usize,
    pub num_born_all: usize,
    pub num_born_this: usize,

    pub avg_innovation: f64,
    pub avg_novelty_preference: f64,
    pub sum_evaluation: f64,
    pub avg_evaluation: f64,

    pub total_energy: f64,
    pub energy_creators: f64,
    pub energy_listeners: f64,
    pub energy_organizers: f64,

    /// Ids of the live agents, in increasing order.
    pub agent_ids: Vec<AgentId>,
    /// Every song still remembered by a live creator.
    pub genres: Vec<GenrePoint>,
}

impl Summary {
    /// Start the summary of the next iteration.
    ///
    /// Cumulative counters are carried over, everything else starts from zero.
    pub fn carry_forward(prev: &Summary) -> Self {
        Self {
            iteration: prev.iteration + 1,
            num_song_all: prev.num_song_all,
            num_evaluation_all: prev.num_evaluation_all,
            num_event_all: prev.num_event_all,
            num_born_all: prev.num_born_all,
            ..Self::default()
        }
    }

    pub fn record_song(&mut self) {
        self.num_song_all += 1;
        self.num_song_this += 1;
    }

    pub fn record_evaluation(&mut self, score: f64) {
        self.num_evaluation_all += 1;
        self.num_evaluation_this += 1;
        self.sum_evaluation += score;
    }

    pub fn record_event(&mut self) {
        self.num_event_all += 1;
        self.num_event_this += 1;
    }

    pub fn record_birth(&mut self) {
        self.num_born_all += 1;
        self.num_born_this += 1;
    }

    /// Compute population statistics over every agent with positive energy.
    pub fn calculate(&mut self, population: &[Agent]) {
        for agent in population.iter().filter(|agent| agent.is_alive()) {
            let energy = agent.energy();
            self.num_population += 1;
            self.total_energy += energy;
            self.agent_ids.push(agent.id());

            if agent.has_role(Role::Creator) {
                self.num_creators += 1;
                self.energy_creators += energy;
                self.avg_innovation += agent.creator().innovation_rate();
            }
            if agent.has_role(Role::Listener) {
                self.num_listeners += 1;
                self.energy_listeners += energy;
                self.avg_novelty_preference += agent.listener().novelty_preference();
            }
            if agent.has_role(Role::Organizer) {
                self.num_organizers += 1;
                self.energy_organizers += energy;
            }

            let memory = agent.creator().memory();
            self.num_song_now += memory.len();
            self.genres.extend(memory.iter().map(|song| GenrePoint {
                song_id: song.id(),
                genre: song.genre().to_vec(),
            }));
        }

        if self.num_creators > 0 {
            self.avg_innovation /= self.num_creators as f64;
        }
        if self.num_listeners > 0 {
            self.avg_novelty_preference /= self.num_listeners as f64;
        }
        if self.num_evaluation_this > 0 {
            self.avg_evaluation = self.sum_evaluation / self.num_evaluation_this as f64;
        }
    }
}
