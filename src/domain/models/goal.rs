//! Goals and constraints for goal-oriented test cases.

use serde::{Deserialize, Serialize};

use super::progress::{FieldKey, FlowState, ProgressState};
use crate::domain::models::intent::AgentIntent;

/// What kind of outcome a goal declares.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalType {
    /// All required fields collected from the caller
    DataCollection { required_fields: Vec<FieldKey> },
    /// The agent confirmed a booking
    BookingConfirmed,
    /// The agent initiated a transfer to a human
    TransferInitiated,
    /// The conversation reached a clean end
    ConversationEnded,
    /// Caller-supplied predicate, identified by name for reporting
    Custom { criteria: String },
}

/// A declared outcome a conversation must reach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    #[serde(flatten)]
    pub goal_type: GoalType,
    /// Required goals failing fail the test; optional goals only report
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub priority: u8,
}

fn default_required() -> bool {
    true
}

/// Severity of a constraint violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintSeverity {
    Warning,
    Error,
    /// May abort the run when configured to do so
    Critical,
}

/// A rule that must (or must not) hold during or at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    #[serde(flatten)]
    pub kind: ConstraintKind,
    pub severity: ConstraintSeverity,
}

/// The condition a constraint checks against progress state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// The agent must never hand off to a human
    NoTransfer,
    /// The run must finish within this many turns
    MaxTurns { limit: u32 },
    /// The named field must be collected before scheduling begins
    FieldBeforeScheduling { field: FieldKey },
    /// The agent must never repeat an intent this many times in a row
    NoExcessiveRepetition { limit: u32 },
}

impl Constraint {
    /// Evaluate against a (possibly final) progress state. Returns a
    /// violation description when the constraint does not hold.
    pub fn check(&self, state: &ProgressState) -> Option<ConstraintViolation> {
        let detail = match &self.kind {
            ConstraintKind::NoTransfer => state
                .transfer_initiated()
                .then(|| "agent initiated a transfer".to_string()),
            ConstraintKind::MaxTurns { limit } => (state.turn_number > *limit)
                .then(|| format!("run took {} turns (limit {})", state.turn_number, limit)),
            ConstraintKind::FieldBeforeScheduling { field } => {
                let scheduling_started = state
                    .intent_history
                    .iter()
                    .any(|r| FlowState::for_intent(r.intent) == Some(FlowState::Scheduling));
                let collected_in_time = state
                    .collected
                    .get(field)
                    .is_some_and(|c| {
                        // Collected before the first scheduling intent
                        state
                            .intent_history
                            .iter()
                            .find(|r| {
                                FlowState::for_intent(r.intent) == Some(FlowState::Scheduling)
                            })
                            .is_none_or(|first| c.turn_collected <= first.turn)
                    });
                (scheduling_started && !collected_in_time).then(|| {
                    format!("{} not collected before scheduling", field.as_str())
                })
            }
            ConstraintKind::NoExcessiveRepetition { limit } => {
                let mut longest = 0u32;
                let mut current = 0u32;
                let mut prev: Option<AgentIntent> = None;
                for record in &state.intent_history {
                    if prev == Some(record.intent) {
                        current += 1;
                    } else {
                        current = 1;
                    }
                    longest = longest.max(current);
                    prev = Some(record.intent);
                }
                (longest > *limit).then(|| {
                    format!("intent repeated {longest} consecutive turns (limit {limit})")
                })
            }
        };

        detail.map(|detail| ConstraintViolation {
            constraint_id: self.id.clone(),
            severity: self.severity,
            detail,
        })
    }
}

/// Record of a constraint that did not hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub constraint_id: String,
    pub severity: ConstraintSeverity,
    pub detail: String,
}

/// Per-goal outcome reported in a test result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalResult {
    pub goal_id: String,
    pub achieved: bool,
    pub required: bool,
    /// For data-collection goals: the fields actually collected
    #[serde(default)]
    pub collected: Vec<FieldKey>,
    #[serde(default)]
    pub missing: Vec<FieldKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_transfer_constraint_fires_on_sticky_flag() {
        let constraint = Constraint {
            id: "no-transfer".into(),
            kind: ConstraintKind::NoTransfer,
            severity: ConstraintSeverity::Error,
        };
        let mut state = ProgressState::new(vec![]);
        assert!(constraint.check(&state).is_none());
        state.mark_transfer_initiated();
        let violation = constraint.check(&state).unwrap();
        assert_eq!(violation.severity, ConstraintSeverity::Error);
    }

    #[test]
    fn max_turns_constraint() {
        let constraint = Constraint {
            id: "short".into(),
            kind: ConstraintKind::MaxTurns { limit: 5 },
            severity: ConstraintSeverity::Warning,
        };
        let mut state = ProgressState::new(vec![]);
        state.turn_number = 5;
        assert!(constraint.check(&state).is_none());
        state.turn_number = 6;
        assert!(constraint.check(&state).is_some());
    }
}
