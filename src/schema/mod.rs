//! Schema module - Configuration, structure, and evolution data types.

mod config;
mod evolution;
mod structure;

pub use config::*;
pub use evolution::*;
pub use structure::*;
