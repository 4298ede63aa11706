//! Patter - Conversation Evaluation and Experimentation Harness
//!
//! Patter runs automated, goal-oriented conversations against a voice
//! scheduling agent, scores the outcomes, and drives controlled A/B
//! experiments over agent configuration changes.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure business logic and domain models
//! - **Service Layer** (`services`): Simulation, statistics, and experiment logic
//! - **Infrastructure Layer** (`infrastructure`): External integrations and adapters
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use patter::services::TestOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire adapters and run a suite
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AgentIntent, Config, Experiment, ExperimentStatus, FlowState, Goal, GoalTestCase,
    GoalTestResult, Persona, ProgressState, Variant,
};
pub use domain::ports::{
    AgentClient, ContentPatcher, ExperimentStore, LlmProvider, ProgressListener, RunStore,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ExperimentService, GoalTestRunner, IntentDetector, StatisticsService, TestOrchestrator,
    TriggerService,
};
