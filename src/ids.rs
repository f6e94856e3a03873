use serde::{Deserialize, Serialize};
use std::{fmt, marker::PhantomData};

/// Unique identifier of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

/// Unique identifier of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(pub u64);

/// Unique identifier of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl AgentId {
    /// Placeholder carried by template agents and offspring not yet admitted.
    pub const UNASSIGNED: Self = Self(0);
}

impl From<u64> for AgentId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<u64> for SongId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<u64> for EventId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "song-{}", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event-{}", self.0)
    }
}

impl<T: From<u64>> Default for IdIssuer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned counter handing out monotonically increasing ids.
///
/// The first issued id is 1 and ids are never reused.
#[derive(Debug)]
pub struct IdIssuer<T> {
    last: u64,
    kind: PhantomData<T>,
}

impl<T: From<u64>> IdIssuer<T> {
    pub fn new() -> Self {
        Self {
            last: 0,
            kind: PhantomData,
        }
    }

    pub fn issue(&mut self) -> T {
        self.last += 1;
        T::from(self.last)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.last
    }
}
