//! Goal-oriented test cases and their terminal results.

use serde::{Deserialize, Serialize};

use super::conversation::ConversationTurn;
use super::goal::{Constraint, ConstraintViolation, Goal, GoalResult};
use super::persona::Persona;
use super::progress::ProgressIssue;

/// Knobs controlling how the simulated caller responds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Probability in [0, 1] that a rambling persona pads its answer
    #[serde(default = "default_filler_chance")]
    pub filler_chance: f64,
    /// Whether the caller volunteers extra detail beyond the asked field
    #[serde(default)]
    pub volunteer_extra: bool,
}

fn default_filler_chance() -> f64 {
    0.3
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            filler_chance: default_filler_chance(),
            volunteer_extra: false,
        }
    }
}

/// The unit of work submitted to the orchestrator: one persona, its goals,
/// and the constraints the conversation must respect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalTestCase {
    pub id: String,
    pub persona: Persona,
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub response_config: ResponseConfig,
    /// Literal opening message; when absent, derived from the persona
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_message: Option<String>,
}

/// Terminal status of one executed test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// The run executed to a stop condition
    Completed,
    /// The run aborted on an unrecoverable error; `error_message` says why
    Error,
}

/// Terminal artifact of one conversation run.
///
/// A result exists for every submitted test case, even on total failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalTestResult {
    pub test_id: String,
    pub passed: bool,
    pub status: TestStatus,
    pub goal_results: Vec<GoalResult>,
    pub constraint_violations: Vec<ConstraintViolation>,
    pub transcript: Vec<ConversationTurn>,
    pub turn_count: u32,
    pub duration_ms: u64,
    pub issues: Vec<ProgressIssue>,
    /// Why the run stopped (ceiling, terminal intent, goals satisfied)
    pub stop_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl GoalTestResult {
    /// Build the error-shaped result the orchestrator must always produce
    /// when a run fails before or during execution.
    pub fn from_error(test_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            passed: false,
            status: TestStatus::Error,
            goal_results: Vec::new(),
            constraint_violations: Vec::new(),
            transcript: Vec::new(),
            turn_count: 0,
            duration_ms: 0,
            issues: Vec::new(),
            stop_reason: "error".to_string(),
            error_message: Some(message.into()),
        }
    }

    /// Fraction of declared goals achieved, used by experiment metrics.
    pub fn goal_completion_rate(&self) -> f64 {
        if self.goal_results.is_empty() {
            return 0.0;
        }
        let achieved = self.goal_results.iter().filter(|g| g.achieved).count();
        achieved as f64 / self.goal_results.len() as f64
    }
}
