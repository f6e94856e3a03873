use crate::agent::{Agent, Role};
use crate::config::OrganizerConfig;
use crate::event::{Event, EventKind, Market};
use crate::ids::{AgentId, EventId};
use crate::summary::Summary;
use rand::prelude::*;
use std::rc::Rc;

/// Organizer role: convenes events and settles them on its next turn.
#[derive(Debug, Clone)]
pub struct Organizer {
    pub(crate) event_probability: f64,
    rules: OrganizerConfig,
    open_events: Vec<EventId>,
}

impl Organizer {
    pub fn new(event_probability: f64, rules: OrganizerConfig) -> Self {
        Self {
            event_probability,
            rules,
            open_events: Vec::new(),
        }
    }

    pub fn blank_copy(&self) -> Self {
        Self::new(self.event_probability, self.rules)
    }
}

/// Run the organizer of `population[idx]`.
///
/// First settles every event it convened earlier, then convenes a new one
/// with probability `event_probability`.
pub fn organize<R: Rng + ?Sized>(
    population: &mut [Agent],
    idx: usize,
    market: &mut Market,
    summary: &mut Summary,
    rng: &mut R,
) {
    settle_open_events(population, idx, market);

    if rng.random_bool(population[idx].organizer.event_probability) {
        convene(population, idx, market, summary, rng);
    }
}

fn settle_open_events(population: &mut [Agent], idx: usize, market: &mut Market) {
    let rules = population[idx].organizer.rules;
    let open_events = std::mem::take(&mut population[idx].organizer.open_events);

    for id in open_events {
        let Some(event) = market.close(id) else {
            continue;
        };
        let settlement = event.settle(&rules);
        log::trace!(
            "{} settled {} ({:?}) with {} songs and {} listeners: fee {:.3}, distributed {:.3}",
            event.organizer(),
            event.id(),
            event.kind(),
            event.entries().len(),
            event.listeners().len(),
            settlement.fee,
            settlement.distributed()
        );
        population[idx].energy += settlement.fee;
        for (creator, amount) in settlement.payouts {
            pay(population, creator, amount);
        }
    }
}

/// Credit a creator, if still part of the population.
///
/// The population is kept sorted by id.
fn pay(population: &mut [Agent], creator: AgentId, amount: f64) {
    match population.binary_search_by_key(&creator, Agent::id) {
        Ok(i_agt) => population[i_agt].energy += amount,
        Err(_) => log::trace!("{creator} is gone, payout of {amount} forfeited"),
    }
}

fn convene<R: Rng + ?Sized>(
    population: &mut [Agent],
    idx: usize,
    market: &mut Market,
    summary: &mut Summary,
    rng: &mut R,
) {
    let rules = population[idx].organizer.rules;
    let organizer_id = population[idx].id();

    let (kind, creator_ratio, listener_ratio, song_ratio) =
        if rng.random_bool(rules.major_probability) {
            let major = &rules.major;
            (EventKind::Major, major.creator_ratio, major.listener_ratio, major.song_ratio)
        } else {
            let minor = &rules.minor;
            (EventKind::Minor, minor.creator_ratio, minor.listener_ratio, minor.song_ratio)
        };

    // Sample participants, each agent independently per role.
    let mut i_creators = Vec::new();
    let mut i_listeners = Vec::new();
    for (i_agt, agent) in population.iter().enumerate() {
        if agent.has_role(Role::Creator) && rng.random_bool(creator_ratio) {
            i_creators.push(i_agt);
        }
        if agent.has_role(Role::Listener) && rng.random_bool(listener_ratio) {
            i_listeners.push(i_agt);
        }
    }

    let creator_pool: Vec<_> = i_creators
        .iter()
        .flat_map(|&i_agt| population[i_agt].creator.memory())
        .filter(|_| rng.random_bool(song_ratio))
        .cloned()
        .collect();
    let listener_pool = i_listeners.iter().map(|&i_agt| population[i_agt].id()).collect();

    let event_id = market.open(|id| {
        Event::new(id, kind, organizer_id, creator_pool.clone(), listener_pool)
    });

    for &i_agt in &i_listeners {
        for song in &creator_pool {
            population[i_agt].listener.deliver(Rc::clone(song), event_id);
        }
    }

    let organizer = &mut population[idx];
    organizer.organizer.open_events.push(event_id);
    organizer.energy -= rules.organization_cost;
    summary.record_event();

    log::trace!(
        "{organizer_id} convened {event_id} ({kind:?}) with {} songs and {} listeners",
        creator_pool.len(),
        i_listeners.len()
    );
}

#[cfg(test)]
impl Organizer {
    pub fn rules(&self) -> &OrganizerConfig {
        &self.rules
    }

    /// Events convened and not settled yet.
    pub fn open_events(&self) -> &[EventId] {
        &self.open_events
    }
}
