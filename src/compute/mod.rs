//! Compute module - Clustering, simulation, and search.

mod cluster;
mod collapse;
mod simulator;

pub mod evolution;

pub use cluster::*;
pub use collapse::*;
pub use simulator::*;
