use crate::ids::{AgentId, IdIssuer, SongId};
use std::rc::Rc;

/// Creative artifact: a point in the genre space plus a reference to its creator.
///
/// Songs are immutable once registered and shared between memories, queues and
/// event pools through [`Rc`].
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    id: SongId,
    genre: Vec<f64>,
    creator: AgentId,
}

impl Song {
    pub fn id(&self) -> SongId {
        self.id
    }

    pub fn genre(&self) -> &[f64] {
        &self.genre
    }

    pub fn creator(&self) -> AgentId {
        self.creator
    }

    /// Mean squared distance per dimension between two genre vectors.
    ///
    /// Lies in `[0, 1]` because every component is in `[0, 1]`.
    pub fn distance(&self, other: &Song) -> f64 {
        let sq_sum: f64 = self
            .genre
            .iter()
            .zip(&other.genre)
            .map(|(val_a, val_b)| (val_a - val_b).powi(2))
            .sum();
        sq_sum / self.genre.len() as f64
    }
}

/// Issues song ids and registers new songs.
#[derive(Debug, Default)]
pub struct SongRegistry {
    ids: IdIssuer<SongId>,
}

impl SongRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new song with a fresh id.
    ///
    /// Genre components are clamped to `[0, 1]`.
    pub fn register(&mut self, genre: Vec<f64>, creator: AgentId) -> Rc<Song> {
        debug_assert!(!genre.is_empty(), "genre vector must not be empty");
        let genre = genre.into_iter().map(|val| val.clamp(0.0, 1.0)).collect();
        Rc::new(Song {
            id: self.ids.issue(),
            genre,
            creator,
        })
    }

    /// Number of songs registered so far.
    pub fn n_registered(&self) -> u64 {
        self.ids.issued()
    }
}
