//! Domain models: pure data types with no infrastructure dependencies.

pub mod config;
pub mod conversation;
pub mod experiment;
pub mod goal;
pub mod intent;
pub mod persona;
pub mod progress;
pub mod test_case;
pub mod variant;

pub use config::{
    AgentConfig, Config, DatabaseConfig, DetectorConfig, ExperimentConfig, LlmConfig,
    LoggingConfig, OrchestratorConfig, RunnerConfig,
};
pub use conversation::{recent_history, ConversationTurn, TurnRole};
pub use experiment::{
    ArmRole, ConclusionReason, Experiment, ExperimentMetrics, ExperimentRun, ExperimentStatus,
    VariantArm, VariantStats,
};
pub use goal::{
    Constraint, ConstraintKind, ConstraintSeverity, ConstraintViolation, Goal, GoalResult,
    GoalType,
};
pub use intent::{AgentIntent, IntentDetectionResult};
pub use persona::{CommunicationStyle, EdgeCaseDisposition, Persona};
pub use progress::{
    CollectedField, FieldKey, FlowState, IntentRecord, IssueKind, ProgressIssue, ProgressState,
};
pub use test_case::{GoalTestCase, GoalTestResult, ResponseConfig, TestStatus};
pub use variant::{Variant, VariantType};
