use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::{Bernoulli, Uniform};
use thiserror::Error;

/// Number of components of a gene.
///
/// Every component lies in `[0, 1]`: three role bits followed by the
/// evolvable traits (see the `Evolvable` impl of [`crate::agent::Agent`]).
pub const GENE_LEN: usize = 9;

/// Decoded role bits at or above this value are switched on.
pub const ROLE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeneError {
    #[error("gene length must be {GENE_LEN}, but is {len}")]
    InvalidGeneLength { len: usize },

    #[error("gene has no viable role")]
    NoViableRole,
}

/// Types whose evolvable traits can be packed into and unpacked from a gene.
pub trait Evolvable {
    fn encode(&self) -> Vec<f64>;

    /// Overwrite the evolvable traits with the ones carried by `gene`.
    ///
    /// Implementations must leave `self` untouched when returning an error.
    fn decode(&mut self, gene: &[f64]) -> Result<(), GeneError>;
}

/// Genetic algorithm parameters.
///
/// Set once when the simulation is constructed and never mutated.
#[derive(Debug, Clone)]
pub struct GaParams {
    mutation_dist: Bernoulli,
    shift_dist: Uniform<f64>,
}

impl GaParams {
    pub fn new(mutation_rate: f64, mutation_strength: f64) -> Result<Self> {
        let mutation_dist =
            Bernoulli::new(mutation_rate).context("invalid mutation rate")?;
        let shift_dist = Uniform::new_inclusive(-mutation_strength, mutation_strength)
            .context("invalid mutation strength")?;
        Ok(Self {
            mutation_dist,
            shift_dist,
        })
    }
}

/// Build a child gene from two parent genes.
///
/// Each component is taken from either parent with equal probability, then
/// shifted by a uniform value in `[-mutation_strength, mutation_strength]`
/// with probability `mutation_rate`. Every component is finally clamped to
/// `[0, 1]`.
pub fn crossover_and_mutate<R: Rng + ?Sized>(
    gene_a: &[f64],
    gene_b: &[f64],
    params: &GaParams,
    rng: &mut R,
) -> Vec<f64> {
    gene_a
        .iter()
        .zip(gene_b)
        .map(|(&val_a, &val_b)| {
            let mut val = if rng.random_bool(0.5) { val_a } else { val_b };
            if params.mutation_dist.sample(rng) {
                val += params.shift_dist.sample(rng);
            }
            val.clamp(0.0, 1.0)
        })
        .collect()
}

/// Create an offspring of two parents.
///
/// The child starts as `copy(template)`, which carries the non-evolvable
/// constants, and then receives the crossed-over gene. The child has no id;
/// assigning one is up to the caller. Decoding failures are returned as is
/// and leave both parents untouched.
pub fn reproduce<T, F, R>(
    parent_a: &T,
    parent_b: &T,
    params: &GaParams,
    template: &T,
    copy: F,
    rng: &mut R,
) -> Result<T, GeneError>
where
    T: Evolvable,
    F: FnOnce(&T) -> T,
    R: Rng + ?Sized,
{
    let gene = crossover_and_mutate(&parent_a.encode(), &parent_b.encode(), params, rng);
    let mut child = copy(template);
    child.decode(&gene)?;
    Ok(child)
}
