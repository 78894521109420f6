//! Generation controller for the demolition search.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::compute::{ClusterMap, SimulationError, Simulator};
use crate::schema::{
    BestPlan, CandidateSnapshot, Chromosome, ConfigError, EnginePhase, GenerationSummary,
    JointRegistry, Population, SearchConfig, SearchProgress, SearchResult, SearchState,
    SearchStats, StopReason,
};

use super::archive::{PlanArchive, auto_tag};
use super::fitness::{Evaluation, FitnessEvaluator};
use super::genome::{GenomeRng, plan_distance};
use super::population::PopulationManager;

/// Errors surfaced by the controller.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("No generation has been evaluated yet")]
    NoEvaluationYet,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    #[error("Saved state does not fit this search: {0}")]
    InvalidState(String),
    #[error("Simulator could not be reset: {0}")]
    Simulation(#[from] SimulationError),
    #[error("Failed to save archive: {0}")]
    Archive(#[from] io::Error),
}

/// Genetic search over demolition plans.
///
/// Each generation is bred, then evaluated in full before the next one
/// starts. With several simulator instances the evaluations of one
/// generation are spread over them. Breeding draws from one RNG per
/// generation, derived from the seed and the generation number, so a
/// resumed search breeds exactly like an uninterrupted one.
pub struct SearchEngine<S: Simulator + Send> {
    config: SearchConfig,
    seed: u64,
    manager: PopulationManager,
    evaluator: FitnessEvaluator,
    simulators: Vec<S>,
    state: SearchState,
    archive: PlanArchive,
    phase: EnginePhase,
    cancelled: Arc<AtomicBool>,
    total_evaluations: u64,
    failed_evaluations: u64,
}

impl<S: Simulator + Send> SearchEngine<S> {
    /// Create an engine driving a single simulator.
    pub fn new(
        config: SearchConfig,
        registry: &JointRegistry,
        simulator: S,
    ) -> Result<Self, SearchError> {
        Self::with_workers(config, registry, vec![simulator])
    }

    /// Create an engine over independent simulator instances, each holding
    /// its own copy of the structure.
    pub fn with_workers(
        config: SearchConfig,
        registry: &JointRegistry,
        mut simulators: Vec<S>,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        if registry.is_empty() {
            return Err(ConfigError::EmptyRegistry.into());
        }
        if simulators.is_empty() {
            return Err(ConfigError::NoWorkers.into());
        }
        if simulators.len() != config.evaluation.workers {
            return Err(ConfigError::WorkerMismatch {
                expected: config.evaluation.workers,
                actual: simulators.len(),
            }
            .into());
        }
        for simulator in &mut simulators {
            simulator.reset()?;
        }

        let seed = match config.random_seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random();
                log::info!("no random_seed configured, using {seed}");
                seed
            }
        };

        let clusters = ClusterMap::new(registry, config.genetics.cluster_radius);
        log::debug!(
            "built {} clusters at radius {} (mean size {:.2})",
            clusters.len(),
            clusters.radius(),
            clusters.mean_size()
        );

        let manager = PopulationManager::new(
            clusters,
            config.population.clone(),
            config.genetics.clone(),
        );
        let evaluator = FitnessEvaluator::new(config.fitness.clone(), config.evaluation.clone());
        let archive = PlanArchive::new(config.archive.archive_size);

        Ok(Self {
            config,
            seed,
            manager,
            evaluator,
            simulators,
            state: SearchState {
                seed: Some(seed),
                ..Default::default()
            },
            archive,
            phase: EnginePhase::Idle,
            cancelled: Arc::new(AtomicBool::new(false)),
            total_evaluations: 0,
            failed_evaluations: 0,
        })
    }

    /// Continue from a previously captured state.
    ///
    /// The state's seed, when present, replaces the configured one. A
    /// population whose score or lineage lists do not line up with its
    /// chromosomes, or whose genes name unknown joints, is rejected.
    pub fn with_state(mut self, state: SearchState) -> Result<Self, SearchError> {
        if let Some(population) = &state.population {
            let n = population.chromosomes.len();
            if population.fitness.len() != n || population.lineage.len() != n {
                return Err(SearchError::InvalidState(format!(
                    "population has {n} chromosomes, {} scores and {} lineage tags",
                    population.fitness.len(),
                    population.lineage.len()
                )));
            }
            let joints = self.manager.clusters().len();
            if let Some(id) = population
                .chromosomes
                .iter()
                .flat_map(|c| &c.genes)
                .flat_map(|g| g.members.iter().copied())
                .find(|&id| id >= joints)
            {
                return Err(SearchError::InvalidState(format!(
                    "joint {id} is outside the registry of {joints} joints"
                )));
            }
        }

        if let Some(seed) = state.seed
            && seed != self.seed
        {
            log::info!("resuming with saved seed {seed}");
            self.seed = seed;
        }
        self.state = state;
        self.state.seed = Some(self.seed);
        Ok(self)
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Seed the genetic operators were started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn clusters(&self) -> &ClusterMap {
        self.manager.clusters()
    }

    pub fn archive(&self) -> &PlanArchive {
        &self.archive
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Flag checked before each generation. Stays set until cleared.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Best plan found so far.
    pub fn best(&self) -> Result<&BestPlan, SearchError> {
        self.state.best.as_ref().ok_or(SearchError::NoEvaluationYet)
    }

    /// Breed (or initialize) and evaluate one generation.
    pub fn run_generation(&mut self) -> Result<GenerationSummary, SearchError> {
        let mut rng = GenomeRng::for_generation(self.seed, self.state.generation);
        let mut population = match &self.state.population {
            Some(previous) if self.state.generation > 0 => {
                self.manager.select_and_breed(previous, &mut rng)
            }
            _ => self.manager.initialize(&mut rng),
        };

        let evaluations = self.evaluate_population(&population.chromosomes);
        self.state.generation += 1;
        let generation = self.state.generation;

        let mut failures = 0;
        for (i, evaluation) in evaluations.iter().enumerate() {
            population.fitness[i] = Some(evaluation.fitness);
            if evaluation.failed() {
                failures += 1;
            }
        }
        self.total_evaluations += evaluations.len() as u64;
        self.failed_evaluations += failures as u64;

        self.update_best(&population, &evaluations, generation);
        self.update_archive(&population, &evaluations, generation);

        let scores: Vec<f32> = evaluations.iter().map(|e| e.fitness).collect();
        let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
        let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let avg = scores.iter().sum::<f32>() / scores.len().max(1) as f32;
        let avg_removed = evaluations.iter().map(|e| e.removed.len()).sum::<usize>() as f32
            / evaluations.len().max(1) as f32;

        let summary = GenerationSummary {
            generation,
            min,
            max,
            avg,
            failures,
            best_so_far: self.state.best.as_ref().map_or(max, |b| b.fitness),
        };
        let diversity = mean_plan_distance(&population.chromosomes);
        self.state.history.record(&summary, avg_removed, diversity);
        self.state.population = Some(population);

        log::info!(
            "generation {generation}: min {min:.4} avg {avg:.4} max {max:.4}, best so far {:.4}",
            summary.best_so_far
        );
        if failures > 0 {
            log::warn!("generation {generation}: {failures} simulations failed");
        }
        Ok(summary)
    }

    /// Evaluate chromosomes in index order, one contiguous chunk per simulator.
    fn evaluate_population(&mut self, chromosomes: &[Chromosome]) -> Vec<Evaluation> {
        let evaluator = &self.evaluator;
        let chunk_size = chromosomes.len().div_ceil(self.simulators.len()).max(1);

        #[cfg(not(target_arch = "wasm32"))]
        let chunks: Vec<Vec<Evaluation>> = self
            .simulators
            .par_iter_mut()
            .zip(chromosomes.par_chunks(chunk_size))
            .map(|(simulator, chunk)| evaluate_chunk(evaluator, chunk, simulator))
            .collect();

        #[cfg(target_arch = "wasm32")]
        let chunks: Vec<Vec<Evaluation>> = self
            .simulators
            .iter_mut()
            .zip(chromosomes.chunks(chunk_size))
            .map(|(simulator, chunk)| evaluate_chunk(evaluator, chunk, simulator))
            .collect();

        chunks.into_iter().flatten().collect()
    }

    /// Replace the best plan only on a strictly higher score.
    fn update_best(
        &mut self,
        population: &Population,
        evaluations: &[Evaluation],
        generation: usize,
    ) {
        let Some(&top) = population.ranking().first() else {
            return;
        };
        let evaluation = &evaluations[top];
        let improved = self
            .state
            .best
            .as_ref()
            .is_none_or(|best| evaluation.fitness > best.fitness);
        if improved {
            log::debug!(
                "new best {:.4} removing {} joints",
                evaluation.fitness,
                evaluation.removed.len()
            );
            self.state.best = Some(BestPlan {
                joints: evaluation.removed.clone(),
                fitness: evaluation.fitness,
                generation,
                extents: evaluation.extents,
            });
        }
    }

    fn update_archive(
        &mut self,
        population: &Population,
        evaluations: &[Evaluation],
        generation: usize,
    ) {
        for (i, evaluation) in evaluations.iter().enumerate() {
            if evaluation.failed() {
                continue;
            }
            let snapshot = CandidateSnapshot {
                fitness: evaluation.fitness,
                joints: evaluation.removed.clone(),
                gene_seeds: population.chromosomes[i].genes.iter().map(|g| g.seed).collect(),
                extents: evaluation.extents,
                generation,
                lineage: population.lineage[i],
            };
            let tags = auto_tag(&snapshot, &self.config.fitness);
            self.archive.add(snapshot, tags);
        }
    }

    /// Run `generations` generations, reporting progress after each.
    pub fn run_with_callback<F>(
        &mut self,
        generations: usize,
        callback: F,
    ) -> Result<SearchResult, SearchError>
    where
        F: FnMut(&SearchProgress),
    {
        self.phase = EnginePhase::Running;
        let outcome = self.run_inner(generations, callback);
        self.phase = EnginePhase::Idle;
        outcome
    }

    fn run_inner<F>(
        &mut self,
        generations: usize,
        mut callback: F,
    ) -> Result<SearchResult, SearchError>
    where
        F: FnMut(&SearchProgress),
    {
        let start = Instant::now();
        let evaluations_before = self.total_evaluations;
        let failures_before = self.failed_evaluations;
        let mut completed = 0;

        let stop_reason = loop {
            if completed == generations {
                break StopReason::Completed;
            }
            if self.cancelled.load(Ordering::Relaxed) {
                log::info!("search cancelled after {completed} of {generations} generations");
                break StopReason::Cancelled;
            }

            let summary = self.run_generation()?;
            completed += 1;
            callback(&SearchProgress {
                summary,
                total_generations: generations,
                completed,
                best: self.state.best.clone(),
            });
        };

        if let Some(dir) = &self.config.archive.archive_dir {
            self.archive.save_to_dir(dir)?;
        }

        let elapsed = start.elapsed().as_secs_f64();
        let total_evaluations = self.total_evaluations - evaluations_before;
        Ok(SearchResult {
            best: self.state.best.clone(),
            archive: self.archive.snapshots(),
            stats: SearchStats {
                generations: completed,
                total_generations: self.state.generation,
                total_evaluations,
                failed_evaluations: self.failed_evaluations - failures_before,
                best_fitness: self.state.best.as_ref().map(|b| b.fitness),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
            history: self.state.history.clone(),
        })
    }

    /// Run `generations` generations.
    pub fn run(&mut self, generations: usize) -> Result<SearchResult, SearchError> {
        self.run_with_callback(generations, |_| {})
    }

    /// Run `generations_per_run` generations.
    pub fn run_configured(&mut self) -> Result<SearchResult, SearchError> {
        self.run(self.config.population.generations_per_run)
    }
}

/// Mean pairwise plan distance.
fn mean_plan_distance(chromosomes: &[Chromosome]) -> f32 {
    let mut total = 0.0;
    let mut pairs = 0;
    for (i, a) in chromosomes.iter().enumerate() {
        for b in &chromosomes[i + 1..] {
            total += plan_distance(a, b);
            pairs += 1;
        }
    }
    if pairs > 0 { total / pairs as f32 } else { 0.0 }
}

fn evaluate_chunk<S: Simulator>(
    evaluator: &FitnessEvaluator,
    chunk: &[Chromosome],
    simulator: &mut S,
) -> Vec<Evaluation> {
    chunk
        .iter()
        .map(|chromosome| evaluator.evaluate(chromosome, simulator))
        .collect()
}
