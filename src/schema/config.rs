//! Configuration types for the demolition search.
//!
//! Every section is flattened into a single JSON object, so a config file is
//! a flat map of the recognized option names:
//!
//! ```json
//! { "pool_size": 20, "cluster_radius": 1.5, "mutation_rate": 0.2, "random_seed": 7 }
//! ```
//!
//! Missing keys fall back to their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level search configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Population and generation settings.
    #[serde(flatten)]
    pub population: PopulationConfig,
    /// Clustering and genetic operator settings.
    #[serde(flatten)]
    pub genetics: GeneticConfig,
    /// Normalization ceilings and weights of the score.
    #[serde(flatten)]
    pub fitness: FitnessConfig,
    /// Per-chromosome simulation settings.
    #[serde(flatten)]
    pub evaluation: EvaluationConfig,
    /// Hall-of-fame settings.
    #[serde(flatten)]
    pub archive: ArchiveConfig,
    /// Random seed for reproducibility.
    pub random_seed: Option<u64>,
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Number of chromosomes per generation. Must be divisible by 4.
    pub pool_size: usize,
    /// Upper bound on genes drawn for a random chromosome.
    pub max_genes_per_chromosome: usize,
    /// Probability that a drawn seed joint is accepted as a gene.
    pub acceptance_probability: f32,
    /// Generations executed by a configured run.
    pub generations_per_run: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            pool_size: 20,
            max_genes_per_chromosome: 5,
            acceptance_probability: 0.8,
            generations_per_run: 10,
        }
    }
}

/// Clustering and genetic operator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    /// Joints strictly closer than this to a seed join its cluster.
    pub cluster_radius: f32,
    /// Per-gene replacement probability.
    pub mutation_rate: f32,
    /// Draws attempted before a replacement gene is given up on.
    pub mutation_retry_limit: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            cluster_radius: 1.0,
            mutation_rate: 0.1,
            mutation_retry_limit: 64,
        }
    }
}

/// Normalization ceilings and weights of the fitness score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Debris radius mapped to the worst radius term.
    pub hard_max_radius: f32,
    /// Residual height mapped to the worst height term.
    pub hard_max_height: f32,
    /// Removed joint count mapped to the worst economy term.
    pub hard_max_removed: f32,
    pub weight_radius: f32,
    pub weight_height: f32,
    pub weight_removed: f32,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            hard_max_radius: 50.0,
            hard_max_height: 50.0,
            hard_max_removed: 100.0,
            weight_radius: 1.0,
            weight_height: 1.0,
            weight_removed: 1.0,
        }
    }
}

impl FitnessConfig {
    /// Sum of the three weights.
    #[inline]
    pub fn total_weight(&self) -> f32 {
        self.weight_radius + self.weight_height + self.weight_removed
    }
}

/// Settings for a single simulated evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Frame the simulator is advanced to before measuring.
    pub sample_frame: u32,
    /// Wall-clock budget per evaluation in milliseconds (None = unbounded).
    pub timeout_ms: Option<u64>,
    /// Number of independent simulator instances evaluating in parallel.
    pub workers: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            sample_frame: 99,
            timeout_ms: Some(60_000),
            workers: 1,
        }
    }
}

/// Hall-of-fame settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Maximum number of distinct plans retained.
    pub archive_size: usize,
    /// Directory the archive is saved to after a run.
    pub archive_dir: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_size: 32,
            archive_dir: None,
        }
    }
}

impl SearchConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.population;
        if p.pool_size == 0 || p.pool_size % 4 != 0 {
            return Err(ConfigError::InvalidPoolSize(p.pool_size));
        }
        if p.max_genes_per_chromosome == 0 {
            return Err(ConfigError::NoGenes);
        }
        check_probability("acceptance_probability", p.acceptance_probability)?;

        let g = &self.genetics;
        if !(g.cluster_radius.is_finite() && g.cluster_radius > 0.0) {
            return Err(ConfigError::InvalidRadius(g.cluster_radius));
        }
        check_probability("mutation_rate", g.mutation_rate)?;
        if g.mutation_retry_limit == 0 {
            return Err(ConfigError::NoRetries);
        }

        let f = &self.fitness;
        for (name, value) in [
            ("hard_max_radius", f.hard_max_radius),
            ("hard_max_height", f.hard_max_height),
            ("hard_max_removed", f.hard_max_removed),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidCeiling { name, value });
            }
        }
        for (name, value) in [
            ("weight_radius", f.weight_radius),
            ("weight_height", f.weight_height),
            ("weight_removed", f.weight_removed),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if f.total_weight() <= 0.0 {
            return Err(ConfigError::ZeroWeights);
        }

        if self.evaluation.sample_frame == 0 {
            return Err(ConfigError::InvalidSampleFrame);
        }
        if self.evaluation.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

fn check_probability(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Pool size {0} must be a positive multiple of 4")]
    InvalidPoolSize(usize),
    #[error("max_genes_per_chromosome must be non-zero")]
    NoGenes,
    #[error("Cluster radius must be positive, got {0}")]
    InvalidRadius(f32),
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f32 },
    #[error("mutation_retry_limit must be non-zero")]
    NoRetries,
    #[error("{name} must be positive, got {value}")]
    InvalidCeiling { name: &'static str, value: f32 },
    #[error("{name} must be non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f32 },
    #[error("At least one fitness weight must be positive")]
    ZeroWeights,
    #[error("sample_frame must be at least 1")]
    InvalidSampleFrame,
    #[error("workers must be at least 1")]
    NoWorkers,
    #[error("workers is {expected} but {actual} simulators were supplied")]
    WorkerMismatch { expected: usize, actual: usize },
    #[error("Joint registry is empty")]
    EmptyRegistry,
    #[error("Joint at index {index} has id {id}; ids must be dense and ordered")]
    JointIdMismatch { index: usize, id: usize },
    #[error("Connection {connection} is invalid: {reason}")]
    InvalidConnection { connection: usize, reason: String },
    #[error("Invalid physics settings: {0}")]
    InvalidPhysics(String),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
