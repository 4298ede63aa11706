//! Domain-level error types.

use thiserror::Error;
use uuid::Uuid;

use super::models::experiment::ExperimentStatus;

/// Errors raised by experiment lifecycle operations.
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("Experiment needs at least two arms, got {0}")]
    TooFewArms(usize),

    #[error("Experiment has no control arm")]
    MissingControl,

    #[error("Traffic split weights must sum to 1.0, got {0}")]
    InvalidTrafficSplit(f64),

    #[error("Invalid sample bounds: min {min}, max {max}")]
    InvalidSampleBounds { min: u32, max: u32 },

    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ExperimentStatus,
        to: ExperimentStatus,
    },

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(Uuid),

    #[error("Variant not found: {0}")]
    VariantNotFound(Uuid),

    #[error("Variant {variant_id} is not an arm of experiment {experiment_id}")]
    VariantNotInExperiment {
        experiment_id: Uuid,
        variant_id: Uuid,
    },

    #[error("Experiment {0} has no recorded winner to adopt")]
    NoWinner(Uuid),
}

/// Errors raised by statistical analysis on invalid inputs.
///
/// Zero-sample comparisons are NOT errors; they return neutral results.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Invalid proportion {0}: must be within [0, 1]")]
    InvalidProportion(f64),

    #[error("Invalid significance level {0}: must be within (0, 1)")]
    InvalidAlpha(f64),

    #[error("Invalid power {0}: must be within (0, 1)")]
    InvalidPower(f64),

    #[error("Minimum detectable effect must be non-zero")]
    ZeroEffect,
}

/// Errors raised while simulating a conversation run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Agent call failed: {0}")]
    Agent(String),

    #[error("Agent call timed out after {0}s")]
    AgentTimeout(u64),

    #[error("Variant apply failed for {target_file}: {detail}")]
    VariantApply { target_file: String, detail: String },

    #[error("Critical constraint violated: {0}")]
    CriticalConstraint(String),
}
