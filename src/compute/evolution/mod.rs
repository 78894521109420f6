//! Genetic search for demolition plans.
//!
//! # Overview
//!
//! - **Genome Operations** (`genome`): random plans, crossover, and mutation
//! - **Fitness** (`fitness`): simulate a plan and score the collapse
//! - **Population** (`population`): initialization and elite breeding
//! - **Search** (`search`): the generation controller
//! - **Plan Archive** (`archive`): hall of fame with JSON export
//!
//! # Example
//!
//! ```rust,no_run
//! use demolition_search::compute::evolution::SearchEngine;
//! use demolition_search::compute::{CollapseSimulator, PhysicsSettings};
//! use demolition_search::schema::{SearchConfig, StructureModel};
//!
//! let model = StructureModel::example();
//! let registry = model.registry().unwrap();
//! let simulator = CollapseSimulator::new(model, PhysicsSettings::default()).unwrap();
//!
//! let mut engine = SearchEngine::new(SearchConfig::default(), &registry, simulator).unwrap();
//! let result = engine
//!     .run_with_callback(10, |progress| {
//!         println!(
//!             "Generation {}: max {:.3}",
//!             progress.summary.generation, progress.summary.max
//!         );
//!     })
//!     .unwrap();
//!
//! let best = engine.best().unwrap();
//! println!("Remove {:?} for a score of {:.3}", best.joints, best.fitness);
//! println!("Archive size: {}", result.archive.len());
//! ```
//!
//! # Breeding
//!
//! Every generation after the first is bred from the two best chromosomes
//! of the previous one: half crossover children (every other one mutated),
//! a quarter fresh random plans, a quarter mutants of the parents. Parents
//! are not copied forward; the engine tracks the best plan separately.

mod archive;
mod fitness;
mod genome;
mod population;
mod search;

pub use archive::{ArchivedPlan, PlanArchive, auto_tag};
pub use fitness::{Evaluation, FitnessEvaluator, demolition_score};
pub use genome::{GeneticError, GenomeRng, plan_distance};
pub use population::PopulationManager;
pub use search::{SearchEngine, SearchError};
