//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random generation, crossover, and mutation of demolition plans.
//! All randomness flows through [`GenomeRng`], so a fixed seed reproduces a
//! search exactly.

use rand::prelude::*;

use crate::compute::ClusterMap;
use crate::schema::{Chromosome, Cluster};

/// Errors raised by genetic operators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneticError {
    #[error("No non-colliding cluster found after {attempts} attempts")]
    ConfigurationExhausted { attempts: usize },
}

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Stream for breeding after `generation` completed generations.
    pub fn for_generation(seed: u64, generation: usize) -> Self {
        Self::new(seed ^ (generation as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Draw up to `max_genes` seeds; each is accepted with probability
    /// `acceptance` and kept only if its cluster shares no joint with the
    /// genes accepted so far.
    pub fn random_chromosome(
        &mut self,
        clusters: &ClusterMap,
        max_genes: usize,
        acceptance: f32,
    ) -> Chromosome {
        let mut chromosome = Chromosome::default();
        if clusters.is_empty() {
            return chromosome;
        }

        for _ in 0..max_genes {
            let seed = self.rng.gen_range(0..clusters.len());
            if !self.chance(acceptance) {
                continue;
            }
            let Some(cluster) = clusters.get(seed) else {
                continue;
            };
            if !chromosome.collides(cluster, None) {
                chromosome.genes.push(cluster.clone());
            }
        }
        chromosome
    }

    /// Uniform positional crossover.
    ///
    /// At each index a fair coin picks a parent; if that parent has no gene
    /// there, the position contributes nothing. Genes from different parents
    /// may share joints; evaluation deduplicates them.
    pub fn crossover(&mut self, parent1: &Chromosome, parent2: &Chromosome) -> Chromosome {
        let len = parent1.len().max(parent2.len());
        let mut genes = Vec::with_capacity(len);

        for i in 0..len {
            let donor = if self.rng.gen_bool(0.5) {
                parent1
            } else {
                parent2
            };
            if let Some(gene) = donor.genes.get(i) {
                genes.push(gene.clone());
            }
        }
        Chromosome::new(genes)
    }

    /// Replace each gene with probability `rate` by a fresh cluster that
    /// differs from it and collides with no other gene.
    ///
    /// A gene whose replacement cannot be found within `retry_limit` draws is
    /// dropped, so the result may be shorter than the input.
    pub fn mutate(
        &mut self,
        chromosome: &Chromosome,
        clusters: &ClusterMap,
        rate: f32,
        retry_limit: usize,
    ) -> Chromosome {
        let mut child = chromosome.clone();
        let mut i = 0;

        while i < child.genes.len() {
            if !self.chance(rate) {
                i += 1;
                continue;
            }
            match self.draw_replacement(&child, i, clusters, retry_limit) {
                Ok(gene) => {
                    child.genes[i] = gene;
                    i += 1;
                }
                Err(e) => {
                    log::debug!("dropping gene {i} (seed {}): {e}", child.genes[i].seed);
                    child.genes.remove(i);
                }
            }
        }
        child
    }

    /// Draw a cluster for position `index` of `chromosome`.
    fn draw_replacement(
        &mut self,
        chromosome: &Chromosome,
        index: usize,
        clusters: &ClusterMap,
        retry_limit: usize,
    ) -> Result<Cluster, GeneticError> {
        let current = &chromosome.genes[index];
        if !clusters.is_empty() {
            for _ in 0..retry_limit {
                let seed = self.rng.gen_range(0..clusters.len());
                let Some(candidate) = clusters.get(seed) else {
                    continue;
                };
                if candidate.members != current.members
                    && !chromosome.collides(candidate, Some(index))
                {
                    return Ok(candidate.clone());
                }
            }
        }
        Err(GeneticError::ConfigurationExhausted {
            attempts: retry_limit,
        })
    }

    /// Bernoulli draw that tolerates the closed interval [0, 1]. Non-finite
    /// probabilities never fire.
    #[inline]
    fn chance(&mut self, p: f32) -> bool {
        if !p.is_finite() {
            return false;
        }
        self.rng.gen_bool(p.clamp(0.0, 1.0) as f64)
    }
}

/// Jaccard distance between the flattened joint sets of two plans.
pub fn plan_distance(a: &Chromosome, b: &Chromosome) -> f32 {
    use std::collections::HashSet;

    let sa: HashSet<_> = a.flatten().into_iter().collect();
    let sb: HashSet<_> = b.flatten().into_iter().collect();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    1.0 - sa.intersection(&sb).count() as f32 / union as f32
}
