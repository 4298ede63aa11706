//! Domain layer: core business types and port contracts.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{ExperimentError, RunError, StatsError};
