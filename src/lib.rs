//! Steward library crate
//!
//! Exposes the governance engine's modules so the CLI and upstream callers
//! can drive the two entry points without going through process startup.

pub mod apply;
pub mod audit;
pub mod config;
pub mod evolution;
pub mod fault;
pub mod issue;
pub mod report;
pub mod scan;
pub mod snapshot;
pub mod state;
pub mod synthesize;
pub mod validate;

pub use audit::run_audit;
pub use evolution::{run_evolution, EvolutionOptions};
