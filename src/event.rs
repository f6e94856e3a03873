use crate::config::OrganizerConfig;
use crate::ids::{AgentId, EventId, IdIssuer, SongId};
use crate::song::Song;
use std::{collections::BTreeMap, rc::Rc};

/// Kind of a convened event, deciding how it is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Major,
    Minor,
}

/// Song entered in an event, with the scores and rewards it accrued.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    song: Rc<Song>,
    scores: Vec<f64>,
    owed: f64,
}

impl PoolEntry {
    /// Reward owed to the song, accumulated from evaluation costs.
    pub fn owed(&self) -> f64 {
        self.owed
    }

    /// Mean evaluation score, 0 for a song nobody evaluated.
    pub fn mean_score(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }
}

#[cfg(test)]
impl PoolEntry {
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }
}

/// Convened market encounter pooling songs and listeners.
#[derive(Debug, Clone)]
pub struct Event {
    id: EventId,
    kind: EventKind,
    organizer: AgentId,
    entries: Vec<PoolEntry>,
    listeners: Vec<AgentId>,
}

/// Outcome of settling an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settlement {
    /// Amount kept by the organizer.
    pub fee: f64,
    /// Amounts paid to song creators, one per payment.
    pub payouts: Vec<(AgentId, f64)>,
}

impl Settlement {
    /// Sum of everything paid to creators.
    pub fn distributed(&self) -> f64 {
        self.payouts.iter().map(|&(_, amount)| amount).sum()
    }
}

impl Event {
    /// Create an event whose pools start with no scores and nothing owed.
    pub fn new(
        id: EventId,
        kind: EventKind,
        organizer: AgentId,
        creator_pool: Vec<Rc<Song>>,
        listener_pool: Vec<AgentId>,
    ) -> Self {
        let entries = creator_pool
            .into_iter()
            .map(|song| PoolEntry {
                song,
                scores: Vec::new(),
                owed: 0.0,
            })
            .collect();
        Self {
            id,
            kind,
            organizer,
            entries,
            listeners: listener_pool,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn organizer(&self) -> AgentId {
        self.organizer
    }

    /// Pooled songs in the order they were entered.
    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn listeners(&self) -> &[AgentId] {
        &self.listeners
    }

    /// Total reward owed to the pooled songs.
    pub fn owed_total(&self) -> f64 {
        self.entries.iter().map(PoolEntry::owed).sum()
    }

    /// Record an evaluation of a pooled song.
    ///
    /// Returns `false` if the song is not in the pool.
    pub fn record(&mut self, song: SongId, score: f64, cost: f64) -> bool {
        match self.entries.iter_mut().find(|entry| entry.song.id() == song) {
            Some(entry) => {
                entry.scores.push(score);
                entry.owed += cost;
                true
            }
            None => false,
        }
    }

    /// Split the owed rewards between the organizer and the song creators.
    ///
    /// The fee plus the distributed amount always equals [`Event::owed_total`].
    pub fn settle(&self, rules: &OrganizerConfig) -> Settlement {
        if self.entries.is_empty() {
            return Settlement::default();
        }
        match self.kind {
            EventKind::Major => self.settle_major(rules),
            EventKind::Minor => self.settle_minor(rules),
        }
    }

    fn settle_major(&self, rules: &OrganizerConfig) -> Settlement {
        let n_songs = self.entries.len();
        let owed_total = self.owed_total();
        let fee = owed_total * rules.fee_rate;
        let pool = owed_total - fee;

        // Stable sort keeps insertion order among equal means.
        let mut ranking: Vec<&PoolEntry> = self.entries.iter().collect();
        ranking.sort_by(|a, b| b.mean_score().total_cmp(&a.mean_score()));

        let n_winners = (n_songs as f64 * rules.major.winner_ratio).floor() as usize;
        let bonus_pool = if n_winners > 0 {
            pool * rules.major.reward_ratio
        } else {
            0.0
        };
        let flat_share = (pool - bonus_pool) / n_songs as f64;

        let mut payouts = Vec::with_capacity(n_songs + n_winners);
        if n_winners > 0 {
            let bonus = bonus_pool / n_winners as f64;
            for entry in &ranking[..n_winners] {
                payouts.push((entry.song.creator(), bonus));
            }
        }
        for entry in &ranking {
            payouts.push((entry.song.creator(), flat_share));
        }

        Settlement { fee, payouts }
    }

    fn settle_minor(&self, rules: &OrganizerConfig) -> Settlement {
        let n_songs = self.entries.len();
        let mut fee = 0.0;
        let mut pool = 0.0;
        let mut payouts = Vec::with_capacity(2 * n_songs);

        for entry in &self.entries {
            let song_fee = entry.owed() * rules.fee_rate;
            let net = entry.owed() - song_fee;
            let direct = net * rules.minor.reward_ratio;
            fee += song_fee;
            pool += net - direct;
            payouts.push((entry.song.creator(), direct));
        }

        let flat_share = pool / n_songs as f64;
        for entry in &self.entries {
            payouts.push((entry.song.creator(), flat_share));
        }

        Settlement { fee, payouts }
    }
}

#[cfg(test)]
impl Market {
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.open.get(&id)
    }
}

#[cfg(test)]
impl Event {
    pub fn entry(&self, song: SongId) -> Option<&PoolEntry> {
        self.entries.iter().find(|entry| entry.song.id() == song)
    }
}

/// Every open event, keyed by id.
#[derive(Debug, Default)]
pub struct Market {
    ids: IdIssuer<EventId>,
    open: BTreeMap<EventId, Event>,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new event built from a freshly issued id.
    pub fn open<F>(&mut self, build: F) -> EventId
    where
        F: FnOnce(EventId) -> Event,
    {
        let id = self.ids.issue();
        self.open.insert(id, build(id));
        id
    }

    pub fn n_open(&self) -> usize {
        self.open.len()
    }

    /// Record an evaluation against an open event.
    ///
    /// Returns `false` if the event is closed or does not pool the song.
    pub fn record_evaluation(&mut self, event: EventId, song: SongId, score: f64, cost: f64) -> bool {
        self.open
            .get_mut(&event)
            .is_some_and(|event| event.record(song, score, cost))
    }

    /// Remove an event from the market so it can be settled.
    pub fn close(&mut self, id: EventId) -> Option<Event> {
        self.open.remove(&id)
    }

    /// Drop every event whose organizer is no longer alive.
    ///
    /// Returns the number of dropped events.
    pub fn drop_orphans<F>(&mut self, is_alive: F) -> usize
    where
        F: Fn(AgentId) -> bool,
    {
        let n_before = self.open.len();
        self.open.retain(|_, event| is_alive(event.organizer));
        n_before - self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::song::SongRegistry;

    fn rules() -> OrganizerConfig {
        Config::default().organizer
    }

    fn scored_event(kind: EventKind, scores: &[(u64, f64, f64)]) -> Event {
        let mut registry = SongRegistry::new();
        let pool: Vec<_> = scores
            .iter()
            .map(|&(creator, _, _)| registry.register(vec![0.5, 0.5], AgentId(creator)))
            .collect();
        let mut event = Event::new(EventId(1), kind, AgentId(100), pool.clone(), vec![]);
        for (song, &(_, score, owed)) in pool.iter().zip(scores) {
            assert!(event.record(song.id(), score, owed));
        }
        event
    }

    fn paid_to(settlement: &Settlement, creator: u64) -> f64 {
        settlement
            .payouts
            .iter()
            .filter(|&&(id, _)| id == AgentId(creator))
            .map(|&(_, amount)| amount)
            .sum()
    }

    #[test]
    fn major_settlement_conserves_rewards() {
        let event = scored_event(
            EventKind::Major,
            &[(1, 0.9, 4.0), (2, 0.1, 2.0), (3, 0.5, 6.0), (4, 0.7, 0.0)],
        );
        let settlement = event.settle(&rules());

        assert!(settlement.payouts.iter().all(|&(_, amount)| amount >= 0.0));
        let total = settlement.fee + settlement.distributed();
        assert!((total - event.owed_total()).abs() < 1e-9);
        assert!((settlement.fee - 12.0 * 0.2).abs() < 1e-12);
    }

    #[test]
    fn major_settlement_pays_bonus_to_top_ranked_songs() {
        let event = scored_event(
            EventKind::Major,
            &[(1, 0.9, 4.0), (2, 0.1, 2.0), (3, 0.5, 6.0), (4, 0.7, 0.0)],
        );
        let settlement = event.settle(&rules());

        // Pool after fee is 9.6: half is split between the two best songs
        // and the other half evenly between all four.
        let bonus = 9.6 * 0.5 / 2.0;
        let flat = 9.6 * 0.5 / 4.0;
        assert!((paid_to(&settlement, 1) - (bonus + flat)).abs() < 1e-9);
        assert!((paid_to(&settlement, 4) - (bonus + flat)).abs() < 1e-9);
        assert!((paid_to(&settlement, 3) - flat).abs() < 1e-9);
        assert!((paid_to(&settlement, 2) - flat).abs() < 1e-9);
    }

    #[test]
    fn major_settlement_without_winners_pays_everything_flat() {
        let event = scored_event(EventKind::Major, &[(1, 0.9, 4.0)]);
        let settlement = event.settle(&rules());

        assert_eq!(settlement.payouts.len(), 1);
        assert!((settlement.distributed() - 3.2).abs() < 1e-12);
        assert!((settlement.fee + settlement.distributed() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn minor_settlement_of_single_song_returns_everything_to_its_creator() {
        let event = scored_event(EventKind::Minor, &[(7, 0.4, 10.0)]);
        let settlement = event.settle(&rules());

        assert!((settlement.fee - 2.0).abs() < 1e-12);
        assert_eq!(settlement.payouts.len(), 2);
        let (creator, direct) = settlement.payouts[0];
        assert_eq!(creator, AgentId(7));
        assert!((direct - 8.0 * 0.5).abs() < 1e-12);
        let (creator, shared) = settlement.payouts[1];
        assert_eq!(creator, AgentId(7));
        assert!((shared - 8.0 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn minor_settlement_conserves_rewards() {
        let event = scored_event(EventKind::Minor, &[(1, 0.4, 10.0), (2, 0.8, 2.0), (3, 0.1, 0.0)]);
        let settlement = event.settle(&rules());

        let total = settlement.fee + settlement.distributed();
        assert!((total - 12.0).abs() < 1e-9);
        // Song 3 earned nothing directly but still shares the pool.
        assert!(paid_to(&settlement, 3) > 0.0);
    }

    #[test]
    fn empty_event_settles_to_nothing() {
        let event = Event::new(EventId(1), EventKind::Major, AgentId(1), vec![], vec![]);
        assert_eq!(event.settle(&rules()), Settlement::default());
    }

    #[test]
    fn unevaluated_songs_rank_last() {
        let mut registry = SongRegistry::new();
        let heard = registry.register(vec![0.1], AgentId(1));
        let unheard = registry.register(vec![0.2], AgentId(2));
        let mut event = Event::new(
            EventId(1),
            EventKind::Major,
            AgentId(3),
            vec![Rc::clone(&unheard), Rc::clone(&heard)],
            vec![],
        );
        event.record(heard.id(), 0.2, 2.0);
        assert_eq!(event.entry(unheard.id()).unwrap().mean_score(), 0.0);

        let mut config = rules();
        config.major.winner_ratio = 0.5;
        let settlement = event.settle(&config);
        let (winner, _) = settlement.payouts[0];
        assert_eq!(winner, AgentId(1));
    }

    #[test]
    fn market_tracks_open_events() {
        let mut market = Market::new();
        let first = market.open(|id| Event::new(id, EventKind::Minor, AgentId(1), vec![], vec![]));
        let second = market.open(|id| Event::new(id, EventKind::Major, AgentId(2), vec![], vec![]));
        assert_eq!(first, EventId(1));
        assert_eq!(second, EventId(2));
        assert_eq!(market.get(second).unwrap().kind(), EventKind::Major);

        assert!(!market.record_evaluation(first, SongId(1), 0.5, 2.0));

        assert_eq!(market.drop_orphans(|id| id == AgentId(2)), 1);
        assert!(market.get(first).is_none());
        assert!(market.close(second).is_some());
        assert_eq!(market.n_open(), 0);
    }
}
