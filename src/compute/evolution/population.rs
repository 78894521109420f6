//! Population lifecycle: random initialization and elite breeding.
//!
//! Breeding takes the two best chromosomes of the previous generation and
//! fills the next one in four equal quarters:
//!
//! | quarter | content                                   |
//! |---------|-------------------------------------------|
//! | 1-2     | crossover of the parents, odd slots mutated |
//! | 3       | fresh random chromosomes                  |
//! | 4       | mutants of parent 1 and parent 2, alternating |
//!
//! The parents themselves are not carried over.

use crate::compute::ClusterMap;
use crate::schema::{Chromosome, GeneticConfig, Lineage, Population, PopulationConfig};

use super::genome::GenomeRng;

/// Builds and breeds populations over a fixed cluster map.
#[derive(Debug, Clone)]
pub struct PopulationManager {
    clusters: ClusterMap,
    population: PopulationConfig,
    genetics: GeneticConfig,
}

impl PopulationManager {
    pub fn new(clusters: ClusterMap, population: PopulationConfig, genetics: GeneticConfig) -> Self {
        Self {
            clusters,
            population,
            genetics,
        }
    }

    pub fn clusters(&self) -> &ClusterMap {
        &self.clusters
    }

    #[inline]
    pub fn pool_size(&self) -> usize {
        self.population.pool_size
    }

    /// A random chromosome with the configured gene bound and acceptance.
    pub fn random_chromosome(&self, rng: &mut GenomeRng) -> Chromosome {
        rng.random_chromosome(
            &self.clusters,
            self.population.max_genes_per_chromosome,
            self.population.acceptance_probability,
        )
    }

    /// Mutate with the configured rate and retry limit.
    pub fn mutate(&self, chromosome: &Chromosome, rng: &mut GenomeRng) -> Chromosome {
        rng.mutate(
            chromosome,
            &self.clusters,
            self.genetics.mutation_rate,
            self.genetics.mutation_retry_limit,
        )
    }

    /// Generation zero: `pool_size` random chromosomes.
    pub fn initialize(&self, rng: &mut GenomeRng) -> Population {
        let chromosomes = (0..self.pool_size())
            .map(|_| self.random_chromosome(rng))
            .collect();
        Population::new(chromosomes, vec![Lineage::Random; self.pool_size()])
    }

    /// Breed the next generation from an evaluated one.
    ///
    /// Parents are the two highest scores, ties going to the lower index.
    /// Unevaluated chromosomes rank last.
    pub fn select_and_breed(&self, previous: &Population, rng: &mut GenomeRng) -> Population {
        let pool = self.pool_size();
        let ranking = previous.ranking();
        let Some(&first) = ranking.first() else {
            log::warn!("breeding from an empty population; reinitializing");
            return self.initialize(rng);
        };
        let second = ranking.get(1).copied().unwrap_or(first);
        let parents = [
            &previous.chromosomes[first],
            &previous.chromosomes[second],
        ];
        log::debug!(
            "breeding from parents #{first} ({:?}) and #{second} ({:?})",
            previous.score(first),
            previous.score(second)
        );

        let half = pool / 2;
        let quarter = pool / 4;
        let mut chromosomes = Vec::with_capacity(pool);
        let mut lineage = Vec::with_capacity(pool);

        for i in 0..half {
            let child = rng.crossover(parents[0], parents[1]);
            if i % 2 == 1 {
                chromosomes.push(self.mutate(&child, rng));
                lineage.push(Lineage::MutatedCrossover);
            } else {
                chromosomes.push(child);
                lineage.push(Lineage::Crossover);
            }
        }

        for _ in 0..quarter {
            chromosomes.push(self.random_chromosome(rng));
            lineage.push(Lineage::Random);
        }

        for i in 0..pool - half - quarter {
            let parent = i % 2;
            chromosomes.push(self.mutate(parents[parent], rng));
            lineage.push(Lineage::EliteMutation { parent });
        }

        Population::new(chromosomes, lineage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cluster, JointRegistry};

    fn manager(pool_size: usize, joints: usize) -> PopulationManager {
        let registry =
            JointRegistry::from_positions((0..joints).map(|i| [i as f32, 0.0, 0.0])).unwrap();
        let clusters = ClusterMap::new(&registry, 1.5);
        PopulationManager::new(
            clusters,
            PopulationConfig {
                pool_size,
                max_genes_per_chromosome: 3,
                acceptance_probability: 1.0,
                generations_per_run: 1,
            },
            GeneticConfig {
                cluster_radius: 1.5,
                mutation_rate: 0.5,
                mutation_retry_limit: 64,
            },
        )
    }

    fn scored(manager: &PopulationManager, rng: &mut GenomeRng, scores: &[f32]) -> Population {
        let mut population = manager.initialize(rng);
        population.fitness = scores.iter().map(|&s| Some(s)).collect();
        population
    }

    #[test]
    fn test_initialize() {
        let manager = manager(12, 30);
        let mut rng = GenomeRng::new(1);
        let population = manager.initialize(&mut rng);
        assert_eq!(population.len(), 12);
        assert_eq!(population.count_lineage(Lineage::Random), 12);
        assert!(population.fitness.iter().all(Option::is_none));
    }

    #[test]
    fn test_breeding_group_sizes() {
        let manager = manager(8, 30);
        let mut rng = GenomeRng::new(2);
        let previous = scored(&manager, &mut rng, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);

        let next = manager.select_and_breed(&previous, &mut rng);
        assert_eq!(next.len(), 8);
        assert_eq!(
            next.count_lineage(Lineage::Crossover) + next.count_lineage(Lineage::MutatedCrossover),
            4
        );
        assert_eq!(next.count_lineage(Lineage::Crossover), 2);
        assert_eq!(next.count_lineage(Lineage::Random), 2);
        assert_eq!(next.count_lineage(Lineage::EliteMutation { parent: 0 }), 1);
        assert_eq!(next.count_lineage(Lineage::EliteMutation { parent: 1 }), 1);
        assert!(!next.is_evaluated());
    }

    #[test]
    fn test_crossover_children_come_from_parents() {
        let manager = manager(16, 60);
        let mut rng = GenomeRng::new(3);
        let previous = scored(
            &manager,
            &mut rng,
            &[
                0.0, 0.0, 0.9, 0.0, 0.0, 0.0, 0.0, 0.8, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            ],
        );
        let parent_genes: Vec<&Cluster> = previous.chromosomes[2]
            .genes
            .iter()
            .chain(&previous.chromosomes[7].genes)
            .collect();

        let next = manager.select_and_breed(&previous, &mut rng);
        for (chromosome, lineage) in next.chromosomes.iter().zip(&next.lineage) {
            if *lineage == Lineage::Crossover {
                assert!(chromosome.genes.iter().all(|g| parent_genes.contains(&g)));
            }
        }
    }

    #[test]
    fn test_ties_prefer_lower_index() {
        let manager = manager(4, 40);
        let mut rng = GenomeRng::new(4);
        let previous = scored(&manager, &mut rng, &[0.5, 0.5, 0.5, 0.5]);
        assert_eq!(&previous.ranking()[..2], &[0, 1]);
    }

    #[test]
    fn test_same_seed_same_offspring() {
        let manager = manager(8, 30);
        let breed = |seed| {
            let mut rng = GenomeRng::new(seed);
            let previous = scored(&manager, &mut rng, &[0.3, 0.1, 0.9, 0.2, 0.5, 0.4, 0.8, 0.7]);
            manager.select_and_breed(&previous, &mut rng).chromosomes
        };
        assert_eq!(breed(17), breed(17));
    }
}
