//! Demolition search - Genetic search for controlled-collapse plans.
//!
//! Given the joints of a structure, this crate searches for a set of joints
//! whose removal makes the structure collapse tightly: low residual height,
//! small debris radius, few joints removed. Physics is delegated to a
//! [`compute::Simulator`]; a small deterministic [`compute::CollapseSimulator`]
//! is bundled for end-to-end runs.
//!
//! # Architecture
//!
//! - `schema`: Serializable structure, configuration, and search state types
//! - `compute`: Clustering, the simulator contract, and the genetic search
//!
//! # Example
//!
//! ```rust,no_run
//! use demolition_search::{
//!     compute::{CollapseSimulator, PhysicsSettings, evolution::SearchEngine},
//!     schema::{SearchConfig, StructureModel},
//! };
//!
//! let model = StructureModel::example();
//! let registry = model.registry().unwrap();
//! let simulator = CollapseSimulator::new(model, PhysicsSettings::default()).unwrap();
//!
//! let config = SearchConfig {
//!     random_seed: Some(7),
//!     ..Default::default()
//! };
//! let mut engine = SearchEngine::new(config, &registry, simulator).unwrap();
//! engine.run(20).unwrap();
//!
//! let best = engine.best().unwrap();
//! println!("Remove joints {:?} (fitness {:.3})", best.joints, best.fitness);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{SearchEngine, SearchError};
pub use compute::{CollapseSimulator, PhysicsSettings, Simulator};
pub use schema::{JointRegistry, SearchConfig, StructureModel};
