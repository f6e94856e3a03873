use crate::event::Market;
use crate::ids::EventId;
use crate::song::Song;
use crate::summary::Summary;
use rand::prelude::*;
use std::{f64::consts::SQRT_2, rc::Rc};

/// Song delivered to a listener by an event.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub song: Rc<Song>,
    pub event: EventId,
}

/// Listener role: evaluates delivered songs against its preference for novelty.
#[derive(Debug, Clone)]
pub struct Listener {
    pub(crate) novelty_preference: f64,
    pub(crate) listening_probability: f64,
    evaluation_cost: f64,
    memory: Vec<Rc<Song>>,
    incoming: Vec<Delivery>,
}

impl Listener {
    pub fn new(novelty_preference: f64, listening_probability: f64, evaluation_cost: f64) -> Self {
        Self {
            novelty_preference,
            listening_probability,
            evaluation_cost,
            memory: Vec::new(),
            incoming: Vec::new(),
        }
    }

    pub fn novelty_preference(&self) -> f64 {
        self.novelty_preference
    }

    pub fn blank_copy(&self) -> Self {
        Self::new(
            self.novelty_preference,
            self.listening_probability,
            self.evaluation_cost,
        )
    }

    pub fn deliver(&mut self, song: Rc<Song>, event: EventId) {
        self.incoming.push(Delivery { song, event });
    }

    /// Score of a song for this listener, in `[0, 1]`.
    ///
    /// Compares the distance to the closest remembered song with the novelty
    /// preference. With an empty memory the song is maximally novel.
    pub fn evaluate(&self, song: &Song) -> f64 {
        let min_distance = self
            .memory
            .iter()
            .map(|known| song.distance(known))
            .fold(1.0, f64::min);
        1.0 - (min_distance - self.novelty_preference).abs() / SQRT_2
    }

    /// Listen to every delivered song once, then clear the queue.
    ///
    /// Each song is evaluated with probability `listening_probability`: the
    /// score is recorded in the delivering event and credited to `energy`, the
    /// evaluation cost is debited from `energy` and owed to the song through
    /// the event, and the song is remembered.
    pub fn listen<R: Rng + ?Sized>(
        &mut self,
        energy: &mut f64,
        market: &mut Market,
        summary: &mut Summary,
        rng: &mut R,
    ) {
        let incoming = std::mem::take(&mut self.incoming);
        for Delivery { song, event } in incoming {
            if !rng.random_bool(self.listening_probability) {
                continue;
            }

            let score = self.evaluate(&song);
            if !market.record_evaluation(event, song.id(), score, self.evaluation_cost) {
                log::trace!(
                    "{event} is closed, evaluation cost for {} forfeited",
                    song.id()
                );
            }
            *energy += score;
            *energy -= self.evaluation_cost;

            self.memory.push(song);
            summary.record_evaluation(score);
        }
    }
}

#[cfg(test)]
impl Listener {
    /// Songs evaluated so far, oldest first.
    pub fn memory(&self) -> &[Rc<Song>] {
        &self.memory
    }

    pub fn evaluation_cost(&self) -> f64 {
        self.evaluation_cost
    }

    /// Songs waiting to be listened to.
    pub fn incoming(&self) -> &[Delivery] {
        &self.incoming
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventKind};
    use crate::ids::AgentId;
    use crate::song::SongRegistry;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn empty_memory_treats_song_as_maximally_novel() {
        let mut registry = SongRegistry::new();
        let song = registry.register(vec![0.3, 0.7], AgentId(1));

        let listener = Listener::new(1.0, 1.0, 2.0);
        assert!((listener.evaluate(&song) - 1.0).abs() < 1e-12);

        let listener = Listener::new(0.0, 1.0, 2.0);
        assert!((listener.evaluate(&song) - (1.0 - 1.0 / SQRT_2)).abs() < 1e-12);
    }

    #[test]
    fn score_uses_closest_remembered_song() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let mut registry = SongRegistry::new();
        let mut market = Market::new();
        let mut summary = Summary::default();
        let mut energy = 0.0;

        let known = registry.register(vec![0.0, 0.0], AgentId(1));
        let event = market.open(|id| Event::new(id, EventKind::Minor, AgentId(2), vec![], vec![]));
        let mut listener = Listener::new(0.0, 1.0, 0.0);
        listener.deliver(known, event);
        listener.listen(&mut energy, &mut market, &mut summary, &mut rng);

        let same = registry.register(vec![0.0, 0.0], AgentId(1));
        assert!((listener.evaluate(&same) - 1.0).abs() < 1e-12);

        let far = registry.register(vec![1.0, 0.0], AgentId(1));
        assert!((listener.evaluate(&far) - (1.0 - 0.5 / SQRT_2)).abs() < 1e-12);
    }

    #[test]
    fn listening_records_scores_and_moves_energy() {
        let mut rng = ChaCha12Rng::seed_from_u64(6);
        let mut registry = SongRegistry::new();
        let mut market = Market::new();
        let mut summary = Summary::default();

        let song_a = registry.register(vec![0.2, 0.2], AgentId(1));
        let song_b = registry.register(vec![0.8, 0.8], AgentId(2));
        let pool = vec![Rc::clone(&song_a), Rc::clone(&song_b)];
        let event = market.open(|id| Event::new(id, EventKind::Major, AgentId(3), pool, vec![]));

        let mut listener = Listener::new(0.5, 1.0, 2.0);
        listener.deliver(Rc::clone(&song_a), event);
        listener.deliver(Rc::clone(&song_b), event);

        let mut energy = 10.0;
        listener.listen(&mut energy, &mut market, &mut summary, &mut rng);

        assert!(listener.incoming().is_empty());
        assert_eq!(listener.memory().len(), 2);
        assert_eq!(summary.num_evaluation_this, 2);

        let event = market.get(event).unwrap();
        let entry_a = event.entry(song_a.id()).unwrap();
        let entry_b = event.entry(song_b.id()).unwrap();
        assert_eq!(entry_a.scores().len(), 1);
        assert_eq!(entry_a.owed(), 2.0);
        assert_eq!(entry_b.owed(), 2.0);

        let score_sum = entry_a.scores()[0] + entry_b.scores()[0];
        assert!((energy - (10.0 + score_sum - 4.0)).abs() < 1e-12);
        assert!((summary.sum_evaluation - score_sum).abs() < 1e-12);
    }

    #[test]
    fn queue_is_cleared_even_when_nothing_is_heard() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let mut registry = SongRegistry::new();
        let mut market = Market::new();
        let mut summary = Summary::default();

        let song = registry.register(vec![0.5, 0.5], AgentId(1));
        let mut listener = Listener::new(0.5, 0.0, 2.0);
        listener.deliver(song, EventId(1));

        let mut energy = 10.0;
        listener.listen(&mut energy, &mut market, &mut summary, &mut rng);

        assert!(listener.incoming().is_empty());
        assert!(listener.memory().is_empty());
        assert_eq!(energy, 10.0);
    }

    #[test]
    fn evaluation_against_closed_event_still_costs() {
        let mut rng = ChaCha12Rng::seed_from_u64(8);
        let mut registry = SongRegistry::new();
        let mut market = Market::new();
        let mut summary = Summary::default();

        let song = registry.register(vec![0.5, 0.5], AgentId(1));
        let mut listener = Listener::new(1.0, 1.0, 2.0);
        listener.deliver(song, EventId(42));

        let mut energy = 10.0;
        listener.listen(&mut energy, &mut market, &mut summary, &mut rng);

        assert!((energy - 9.0).abs() < 1e-12);
        assert_eq!(summary.num_evaluation_this, 1);
    }
}
