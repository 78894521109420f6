//! Evolution data types for demolition plan search.
//!
//! A plan is encoded as a [`Chromosome`]: an ordered list of [`Cluster`]
//! genes, each removing a spatially coherent group of joints.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::JointId;

// ============================================================================
// Genome Types
// ============================================================================

/// Joints within the cluster radius of a seed joint, seed included.
///
/// Members are sorted ascending. Two clusters are equal when they were grown
/// from the same seed over the same registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cluster {
    /// Joint the cluster was grown from.
    pub seed: JointId,
    /// Member joint ids, ascending.
    pub members: Vec<JointId>,
}

impl Cluster {
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether any member also belongs to `other`.
    pub fn overlaps(&self, other: &Cluster) -> bool {
        // Both member lists are sorted; merge-walk them.
        let (mut i, mut j) = (0, 0);
        while i < self.members.len() && j < other.members.len() {
            match self.members[i].cmp(&other.members[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }
}

/// A candidate demolition plan: remove every joint covered by these genes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chromosome {
    pub genes: Vec<Cluster>,
}

impl Chromosome {
    pub fn new(genes: Vec<Cluster>) -> Self {
        Self { genes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Joint ids of all genes, first occurrence wins, order preserved.
    pub fn flatten(&self) -> Vec<JointId> {
        let mut seen = HashSet::new();
        self.genes
            .iter()
            .flat_map(|gene| gene.members.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Total member count across genes, duplicates included.
    pub fn covered_len(&self) -> usize {
        self.genes.iter().map(Cluster::len).sum()
    }

    /// Whether `cluster` shares a joint with any gene except the one at `skip`.
    pub fn collides(&self, cluster: &Cluster, skip: Option<usize>) -> bool {
        self.genes
            .iter()
            .enumerate()
            .any(|(i, gene)| Some(i) != skip && gene.overlaps(cluster))
    }
}

/// How a chromosome came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lineage {
    /// Drawn by random initialization or diversity injection.
    Random,
    /// Crossover of the two elite parents.
    Crossover,
    /// Crossover of the two elite parents, then mutated.
    MutatedCrossover,
    /// Mutation of one elite parent (0 = best, 1 = runner-up).
    EliteMutation { parent: usize },
}

/// One generation's chromosomes with index-aligned scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Population {
    pub chromosomes: Vec<Chromosome>,
    /// `None` until the chromosome at the same index is evaluated.
    pub fitness: Vec<Option<f32>>,
    pub lineage: Vec<Lineage>,
}

impl Population {
    /// Create an unevaluated population.
    pub fn new(chromosomes: Vec<Chromosome>, lineage: Vec<Lineage>) -> Self {
        debug_assert_eq!(chromosomes.len(), lineage.len());
        let fitness = vec![None; chromosomes.len()];
        Self {
            chromosomes,
            fitness,
            lineage,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    /// True once every chromosome has a score.
    pub fn is_evaluated(&self) -> bool {
        self.fitness.iter().all(Option::is_some)
    }

    /// Count of chromosomes with the given lineage.
    pub fn count_lineage(&self, lineage: Lineage) -> usize {
        self.lineage.iter().filter(|&&l| l == lineage).count()
    }

    /// Score of the chromosome at `index`, if evaluated.
    #[inline]
    pub fn score(&self, index: usize) -> Option<f32> {
        self.fitness.get(index).copied().flatten()
    }

    /// Indices ordered by descending fitness; ties keep index order and
    /// unevaluated entries sort last.
    pub fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            let fa = self.score(a).unwrap_or(f32::NEG_INFINITY);
            let fb = self.score(b).unwrap_or(f32::NEG_INFINITY);
            fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }
}

// ============================================================================
// Evaluation and Search State
// ============================================================================

/// Debris extents measured after a simulated collapse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DebrisExtents {
    /// Maximum horizontal distance from the origin over all debris.
    pub max_radius: f32,
    /// Maximum vertical coordinate over all debris.
    pub max_height: f32,
}

/// Best plan observed so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPlan {
    /// Flattened, deduplicated joint ids to remove.
    pub joints: Vec<JointId>,
    pub fitness: f32,
    /// Generation (1-based) the plan was evaluated in.
    pub generation: usize,
    /// Measured extents, absent if the evaluation failed.
    pub extents: Option<DebrisExtents>,
}

/// Fitness statistics for one evaluated generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Generation number after the step (1 for the first).
    pub generation: usize,
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    /// Evaluations that ended in a simulation failure.
    pub failures: usize,
    /// Best fitness over the whole run after this generation.
    pub best_so_far: f32,
}

/// Evolution history for plotting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f32>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f32>,
    /// Worst fitness per generation.
    pub min_fitness: Vec<f32>,
    /// Mean flattened plan size per generation.
    pub avg_removed: Vec<f32>,
    /// Mean pairwise plan distance per generation.
    pub diversity: Vec<f32>,
}

impl SearchHistory {
    pub fn record(&mut self, summary: &GenerationSummary, avg_removed: f32, diversity: f32) {
        self.best_fitness.push(summary.max);
        self.avg_fitness.push(summary.avg);
        self.min_fitness.push(summary.min);
        self.avg_removed.push(avg_removed);
        self.diversity.push(diversity);
    }
}

/// Complete mutable state of a search, owned by the controller.
///
/// Capturing this between runs is the only way to carry a search over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchState {
    /// Seed the breeding streams derive from.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Completed generations; 0 means no population yet.
    pub generation: usize,
    /// Most recently evaluated population.
    pub population: Option<Population>,
    pub best: Option<BestPlan>,
    pub history: SearchHistory,
}

/// Controller state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EnginePhase {
    #[default]
    Idle,
    Running,
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Snapshot of an evaluated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub fitness: f32,
    /// Flattened joint ids.
    pub joints: Vec<JointId>,
    /// Seed joint of each gene.
    pub gene_seeds: Vec<JointId>,
    pub extents: Option<DebrisExtents>,
    pub generation: usize,
    pub lineage: Lineage,
}

/// Progress update emitted after each generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    pub summary: GenerationSummary,
    /// Generations requested for this run.
    pub total_generations: usize,
    /// Generations completed in this run.
    pub completed: usize,
    pub best: Option<BestPlan>,
}

/// Reason a run stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Ran all requested generations.
    Completed,
    /// Cancelled before a generation started.
    Cancelled,
}

/// Statistics from a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    /// Generations executed by this run.
    pub generations: usize,
    /// Total generations over the engine's lifetime.
    pub total_generations: usize,
    pub total_evaluations: u64,
    pub failed_evaluations: u64,
    pub best_fitness: Option<f32>,
    pub elapsed_seconds: f64,
    pub evaluations_per_second: f64,
    pub stop_reason: StopReason,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub best: Option<BestPlan>,
    /// Archived plans, best first.
    pub archive: Vec<CandidateSnapshot>,
    pub stats: SearchStats,
    pub history: SearchHistory,
}
