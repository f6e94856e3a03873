use crate::config::{AgentConfig, OrganizerConfig};
use crate::creator::Creator;
use crate::event::Market;
use crate::gene::{self, Evolvable, GENE_LEN, GaParams, GeneError, ROLE_THRESHOLD};
use crate::ids::{AgentId, IdIssuer};
use crate::listener::Listener;
use crate::organizer::{self, Organizer};
use crate::song::SongRegistry;
use crate::summary::Summary;
use rand::prelude::*;

/// Capability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Creator,
    Listener,
    Organizer,
}

impl Role {
    fn index(self) -> usize {
        match self {
            Role::Creator => 0,
            Role::Listener => 1,
            Role::Organizer => 2,
        }
    }
}

/// Set of roles of an agent, never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles([bool; 3]);

impl Roles {
    /// Build a role set from `[creator, listener, organizer]` bits.
    pub fn new(bits: [bool; 3]) -> Result<Self, GeneError> {
        if !bits.contains(&true) {
            return Err(GeneError::NoViableRole);
        }
        Ok(Self(bits))
    }

    pub fn all() -> Self {
        Self([true; 3])
    }

    pub fn has(self, role: Role) -> bool {
        self.0[role.index()]
    }

    pub fn bits(self) -> [bool; 3] {
        self.0
    }
}

/// Member of the population.
///
/// Always owns the three role states; only those whose role is in `roles`
/// are ever run.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    roles: Roles,
    pub(crate) energy: f64,
    default_energy: f64,
    elimination_threshold: f64,
    reproduction_probability: f64,

    pub(crate) creator: Creator,
    pub(crate) listener: Listener,
    pub(crate) organizer: Organizer,
}

impl Agent {
    /// Create the template agent carrying every experiment constant.
    ///
    /// All roles are enabled and every evolvable trait is 0.5.
    pub fn template(agent: &AgentConfig, organizer: &OrganizerConfig, genre_dim: usize) -> Self {
        Self {
            id: AgentId::UNASSIGNED,
            roles: Roles::all(),
            energy: agent.default_energy,
            default_energy: agent.default_energy,
            elimination_threshold: agent.elimination_threshold,
            reproduction_probability: 0.5,
            creator: Creator::new(0.5, 0.5, agent.creation_cost, genre_dim),
            listener: Listener::new(0.5, 0.5, agent.evaluation_cost),
            organizer: Organizer::new(0.5, *organizer),
        }
    }

    /// Create a founder with random roles and traits and the constants of `template`.
    ///
    /// Role bits are drawn with probability 0.5 each until at least one is set.
    pub fn random_founder<R: Rng + ?Sized>(id: AgentId, template: &Agent, rng: &mut R) -> Self {
        let roles = loop {
            let bits = [rng.random_bool(0.5), rng.random_bool(0.5), rng.random_bool(0.5)];
            if let Ok(roles) = Roles::new(bits) {
                break roles;
            }
        };

        let mut agent = template.clone_constants();
        agent.id = id;
        agent.roles = roles;
        agent.reproduction_probability = rng.random();
        agent.creator.innovation_rate = rng.random();
        agent.creator.creation_probability = rng.random();
        agent.listener.novelty_preference = rng.random();
        agent.listener.listening_probability = rng.random();
        agent.organizer.event_probability = rng.random();
        agent
    }

    /// Copy constants and traits into a fresh agent.
    ///
    /// The copy has no id, full default energy, empty memories and queues,
    /// and no open events.
    pub fn clone_constants(&self) -> Self {
        Self {
            id: AgentId::UNASSIGNED,
            roles: self.roles,
            energy: self.default_energy,
            default_energy: self.default_energy,
            elimination_threshold: self.elimination_threshold,
            reproduction_probability: self.reproduction_probability,
            creator: self.creator.blank_copy(),
            listener: self.listener.blank_copy(),
            organizer: self.organizer.blank_copy(),
        }
    }

    pub fn assign_id(&mut self, id: AgentId) {
        self.id = id;
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.has(role)
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn is_alive(&self) -> bool {
        self.energy > 0.0
    }

    pub fn creator(&self) -> &Creator {
        &self.creator
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }
}

#[cfg(test)]
impl Agent {
    pub(crate) fn set_roles(&mut self, roles: Roles) {
        self.roles = roles;
    }

    pub fn roles(&self) -> Roles {
        self.roles
    }

    pub fn default_energy(&self) -> f64 {
        self.default_energy
    }

    pub fn elimination_threshold(&self) -> f64 {
        self.elimination_threshold
    }

    pub fn reproduction_probability(&self) -> f64 {
        self.reproduction_probability
    }

    pub fn organizer(&self) -> &Organizer {
        &self.organizer
    }
}

/// Gene layout: role bits (creator, listener, organizer), reproduction
/// probability, innovation rate, creation probability, novelty preference,
/// listening probability, event probability.
impl Evolvable for Agent {
    fn encode(&self) -> Vec<f64> {
        let mut gene = Vec::with_capacity(GENE_LEN);
        gene.extend(
            self.roles
                .bits()
                .iter()
                .map(|&bit| if bit { 1.0 } else { 0.0 }),
        );
        gene.push(self.reproduction_probability);
        gene.push(self.creator.innovation_rate);
        gene.push(self.creator.creation_probability);
        gene.push(self.listener.novelty_preference);
        gene.push(self.listener.listening_probability);
        gene.push(self.organizer.event_probability);
        gene
    }

    fn decode(&mut self, gene: &[f64]) -> Result<(), GeneError> {
        if gene.len() != GENE_LEN {
            return Err(GeneError::InvalidGeneLength { len: gene.len() });
        }

        let roles = Roles::new([
            gene[0] >= ROLE_THRESHOLD,
            gene[1] >= ROLE_THRESHOLD,
            gene[2] >= ROLE_THRESHOLD,
        ])?;

        self.roles = roles;
        self.reproduction_probability = gene[3];
        self.creator.innovation_rate = gene[4];
        self.creator.creation_probability = gene[5];
        self.listener.novelty_preference = gene[6];
        self.listener.listening_probability = gene[7];
        self.organizer.event_probability = gene[8];
        Ok(())
    }
}

/// Shared state an agent acts upon during an iteration.
pub struct Context<'a> {
    pub market: &'a mut Market,
    pub songs: &'a mut SongRegistry,
    pub agent_ids: &'a mut IdIssuer<AgentId>,
    pub ga_params: &'a GaParams,
    pub template: &'a Agent,
    pub summary: &'a mut Summary,
    pub newborns: &'a mut Vec<Agent>,
}

/// Run every behavior of `population[idx]` for one iteration.
///
/// Listening comes first so that songs delivered during the previous
/// iteration are heard before new songs are created.
pub fn run<R: Rng + ?Sized>(population: &mut [Agent], idx: usize, ctx: &mut Context<'_>, rng: &mut R) {
    let agent = &mut population[idx];
    let me = agent.id;

    if agent.has_role(Role::Listener) {
        agent
            .listener
            .listen(&mut agent.energy, ctx.market, ctx.summary, rng);
    }

    if agent.has_role(Role::Creator) {
        agent
            .creator
            .create(me, &mut agent.energy, ctx.songs, ctx.summary, rng);
    }

    if population[idx].has_role(Role::Organizer) {
        organizer::organize(population, idx, ctx.market, ctx.summary, rng);
    }

    reproduce(population, idx, ctx, rng);
}

/// Attempt reproduction of `population[idx]`.
///
/// Requires at least half of the default energy. With probability
/// `reproduction_probability` a spouse is drawn among every agent with at
/// least half of the default energy (possibly the agent itself). Both
/// parents pay half of the default energy whether or not the offspring is
/// viable.
pub fn reproduce<R: Rng + ?Sized>(
    population: &mut [Agent],
    idx: usize,
    ctx: &mut Context<'_>,
    rng: &mut R,
) {
    let half_energy = population[idx].default_energy / 2.0;
    if population[idx].energy < half_energy {
        return;
    }
    if !rng.random_bool(population[idx].reproduction_probability) {
        return;
    }

    let i_candidates: Vec<_> = population
        .iter()
        .enumerate()
        .filter(|(_, agent)| agent.energy >= half_energy)
        .map(|(i_agt, _)| i_agt)
        .collect();
    let Some(&i_spouse) = i_candidates.choose(rng) else {
        return;
    };

    let offspring = gene::reproduce(
        &population[idx],
        &population[i_spouse],
        ctx.ga_params,
        ctx.template,
        Agent::clone_constants,
        rng,
    );
    match offspring {
        Ok(mut child) => {
            child.assign_id(ctx.agent_ids.issue());
            ctx.summary.record_birth();
            ctx.newborns.push(child);
        }
        Err(error) => log::debug!("{} discarded offspring: {error}", population[idx].id),
    }

    population[idx].energy -= half_energy;
    population[i_spouse].energy -= half_energy;
}
