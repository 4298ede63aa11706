//! Service layer: the core simulation and experimentation logic.
//!
//! Services depend only on domain types and port traits; infrastructure
//! adapters are injected as `Arc<dyn Trait>`.

pub mod experiment_runner;
pub mod experiment_service;
pub mod goal_runner;
pub mod intent_detector;
pub mod orchestrator;
pub mod persona_responder;
pub mod progress_tracker;
pub mod statistics;
pub mod trigger_service;

pub use experiment_runner::ExperimentRunner;
pub use experiment_service::{ConclusionCheck, ExperimentService, ExperimentServiceError};
pub use goal_runner::{GoalTestRunner, VariantLease};
pub use intent_detector::IntentDetector;
pub use orchestrator::TestOrchestrator;
pub use persona_responder::PersonaResponder;
pub use progress_tracker::ProgressTracker;
pub use statistics::{
    ConclusionRecommendation, EffectMagnitude, MeanComparison, PassRateComparison,
    StatisticsService,
};
pub use trigger_service::{
    ChangeKind, ExperimentRecommendation, FixProposal, ImpactLevel, TriggerAssessment,
    TriggerRules, TriggerService,
};
