use crate::ids::AgentId;
use crate::song::{Song, SongRegistry};
use crate::summary::Summary;
use rand::prelude::*;
use std::rc::Rc;

/// Creator role: produces songs from scratch or by varying remembered ones.
#[derive(Debug, Clone)]
pub struct Creator {
    pub(crate) innovation_rate: f64,
    pub(crate) creation_probability: f64,
    creation_cost: f64,
    genre_dim: usize,
    memory: Vec<Rc<Song>>,
}

impl Creator {
    pub fn new(
        innovation_rate: f64,
        creation_probability: f64,
        creation_cost: f64,
        genre_dim: usize,
    ) -> Self {
        Self {
            innovation_rate,
            creation_probability,
            creation_cost,
            genre_dim,
            memory: Vec::new(),
        }
    }

    pub fn innovation_rate(&self) -> f64 {
        self.innovation_rate
    }

    /// Songs created so far, oldest first.
    pub fn memory(&self) -> &[Rc<Song>] {
        &self.memory
    }

    /// Same role parameters with an empty memory.
    pub fn blank_copy(&self) -> Self {
        Self::new(
            self.innovation_rate,
            self.creation_probability,
            self.creation_cost,
            self.genre_dim,
        )
    }

    /// Try to create a song.
    ///
    /// With probability `creation_probability` a new song is registered,
    /// remembered, and its cost is debited from `energy`.
    pub fn create<R: Rng + ?Sized>(
        &mut self,
        me: AgentId,
        energy: &mut f64,
        registry: &mut SongRegistry,
        summary: &mut Summary,
        rng: &mut R,
    ) -> Option<Rc<Song>> {
        if !rng.random_bool(self.creation_probability) {
            return None;
        }

        let genre = self.compose_genre(rng);
        let song = registry.register(genre, me);
        self.memory.push(Rc::clone(&song));

        *energy -= self.creation_cost;
        summary.record_song();

        Some(song)
    }

    /// Sample a genre vector.
    ///
    /// Uniform over `[0, 1]^genre_dim` while the memory is empty; otherwise a
    /// remembered song shifted by up to `innovation_rate` in each direction.
    pub fn compose_genre<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        match self.memory.choose(rng) {
            None => (0..self.genre_dim).map(|_| rng.random::<f64>()).collect(),
            Some(base) => {
                let rate = self.innovation_rate;
                base.genre()
                    .iter()
                    .map(|&val| (val + rng.random_range(-rate..=rate)).clamp(0.0, 1.0))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
impl Creator {
    pub fn creation_cost(&self) -> f64 {
        self.creation_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn empty_memory_samples_uniformly() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let creator = Creator::new(0.3, 1.0, 2.0, 2);

        let n_samples = 20_000;
        let mut sums = [0.0; 2];
        let mut quadrants = [0usize; 4];
        for _ in 0..n_samples {
            let genre = creator.compose_genre(&mut rng);
            assert_eq!(genre.len(), 2);
            assert!(genre.iter().all(|val| (0.0..=1.0).contains(val)));
            sums[0] += genre[0];
            sums[1] += genre[1];
            let quadrant = usize::from(genre[0] >= 0.5) + 2 * usize::from(genre[1] >= 0.5);
            quadrants[quadrant] += 1;
        }

        for sum in sums {
            let mean = sum / n_samples as f64;
            assert!((mean - 0.5).abs() < 0.02, "mean {mean}");
        }
        let expected = n_samples / 4;
        for count in quadrants {
            assert!(count.abs_diff(expected) < expected / 10, "quadrants {quadrants:?}");
        }
    }

    #[test]
    fn variations_stay_within_innovation_rate() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let mut registry = SongRegistry::new();
        let mut summary = Summary::default();
        let mut energy = 100.0;
        let mut creator = Creator::new(0.1, 1.0, 2.0, 2);

        let first = creator
            .create(AgentId(1), &mut energy, &mut registry, &mut summary, &mut rng)
            .unwrap();
        for _ in 0..200 {
            let genre = creator.compose_genre(&mut rng);
            for (val, base) in genre.iter().zip(first.genre()) {
                assert!((val - base).abs() <= 0.1 + 1e-12);
            }
        }
    }

    #[test]
    fn creation_registers_song_and_pays_cost() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let mut registry = SongRegistry::new();
        let mut summary = Summary::default();
        let mut energy = 100.0;
        let mut creator = Creator::new(0.5, 1.0, 2.0, 3);

        for _ in 0..3 {
            creator.create(AgentId(9), &mut energy, &mut registry, &mut summary, &mut rng);
        }

        assert_eq!(creator.memory().len(), 3);
        assert_eq!(energy, 94.0);
        assert_eq!(summary.num_song_this, 3);
        assert_eq!(summary.num_song_all, 3);
        assert!(creator.memory().iter().all(|song| song.creator() == AgentId(9)));
        assert!(creator.memory().iter().all(|song| song.genre().len() == 3));
    }

    #[test]
    fn failed_probability_check_is_free() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let mut registry = SongRegistry::new();
        let mut summary = Summary::default();
        let mut energy = 100.0;
        let mut creator = Creator::new(0.5, 0.0, 2.0, 2);

        let song = creator.create(AgentId(1), &mut energy, &mut registry, &mut summary, &mut rng);

        assert!(song.is_none());
        assert_eq!(energy, 100.0);
        assert!(creator.memory().is_empty());
        assert_eq!(registry.n_registered(), 0);
    }
}
