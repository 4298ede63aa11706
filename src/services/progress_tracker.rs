//! Per-conversation progress tracking.
//!
//! The tracker ingests each detected intent together with the caller's
//! reply, advances the coarse flow state, records collected fields
//! (first assignment wins), maintains the sticky outcome flags, flags
//! stall/repetition/low-confidence issues, and re-evaluates the declared
//! goals after every update.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::models::{
    AgentIntent, DetectorConfig, FlowState, Goal, GoalResult, GoalType, IntentDetectionResult,
    IntentRecord, IssueKind, ProgressIssue, ProgressState,
};

/// Confidence below which a low-confidence issue is recorded.
const LOW_CONFIDENCE_FLOOR: f64 = 0.5;

/// Caller-supplied predicate for custom goals, keyed by the goal's
/// `criteria` string. Receives a read-only view of progress.
pub type CustomEvaluator = Arc<dyn Fn(&ProgressState) -> bool + Send + Sync>;

/// Tracks one conversation's progress against its goals.
pub struct ProgressTracker {
    repetition_threshold: u32,
    stuck_threshold: u32,
    custom_evaluators: HashMap<String, CustomEvaluator>,
}

impl ProgressTracker {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            repetition_threshold: config.repetition_threshold,
            stuck_threshold: config.stuck_threshold,
            custom_evaluators: HashMap::new(),
        }
    }

    /// Register a predicate for `Custom` goals whose `criteria` matches
    /// `name`.
    pub fn register_custom_evaluator(&mut self, name: impl Into<String>, eval: CustomEvaluator) {
        self.custom_evaluators.insert(name.into(), eval);
    }

    /// Ingest one detected intent and the caller utterance that answered
    /// it, then re-evaluate goals.
    pub fn update(
        &self,
        state: &mut ProgressState,
        detection: &IntentDetectionResult,
        caller_utterance: &str,
        turn_number: u32,
        goals: &[Goal],
    ) {
        state.turn_number = turn_number;
        let intent = detection.primary_intent;

        state.intent_history.push(IntentRecord {
            intent,
            confidence: detection.confidence,
            turn: turn_number,
        });

        // Unmapped intents leave the flow state unchanged.
        if let Some(next) = FlowState::for_intent(intent) {
            if next != state.flow_state {
                debug!(from = state.flow_state.as_str(), to = next.as_str(), "flow state advanced");
            }
            state.flow_state = next;
        }

        match intent {
            AgentIntent::ConfirmingBooking => state.mark_booking_confirmed(),
            AgentIntent::InitiatingTransfer => state.mark_transfer_initiated(),
            _ => {}
        }

        // The field the agent asked for is supplied by the caller's reply.
        // Later mentions of an already-collected field still land in the
        // intent history above, but never overwrite the first value.
        if let Some(field) = intent.asks_for() {
            if !caller_utterance.trim().is_empty() {
                state.collect_field(field, caller_utterance.trim().to_string(), turn_number);
            }
        }

        self.detect_issues(state, detection, turn_number);
        self.evaluate_goals(state, goals);
    }

    fn detect_issues(
        &self,
        state: &mut ProgressState,
        detection: &IntentDetectionResult,
        turn_number: u32,
    ) {
        // Consecutive repetition of the same intent.
        let streak = state
            .intent_history
            .iter()
            .rev()
            .take_while(|r| r.intent == detection.primary_intent)
            .count() as u32;
        if streak == self.repetition_threshold {
            state.issues.push(ProgressIssue {
                kind: IssueKind::Repetition,
                turn: turn_number,
                detail: format!(
                    "intent {} repeated {streak} consecutive turns",
                    detection.primary_intent.as_str()
                ),
            });
        }

        // Stuck: zero fields collected after the threshold. Fires once.
        // Partial-collection stalls are intentionally not flagged.
        if state.collected.is_empty()
            && turn_number >= self.stuck_threshold
            && !state.issues.iter().any(|i| i.kind == IssueKind::Stuck)
        {
            state.issues.push(ProgressIssue {
                kind: IssueKind::Stuck,
                turn: turn_number,
                detail: format!("no field collected after {turn_number} turns"),
            });
        }

        if detection.confidence < LOW_CONFIDENCE_FLOOR {
            state.issues.push(ProgressIssue {
                kind: IssueKind::LowConfidence,
                turn: turn_number,
                detail: format!(
                    "intent {} detected at confidence {:.2}",
                    detection.primary_intent.as_str(),
                    detection.confidence
                ),
            });
        }
    }

    /// Re-evaluate all goals, refreshing both the completed and the
    /// not-yet-achieved sets. A goal moves between the two freely until
    /// the run ends; only the final snapshot is authoritative.
    pub fn evaluate_goals(&self, state: &mut ProgressState, goals: &[Goal]) {
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        for goal in goals {
            if self.goal_achieved(state, goal) {
                completed.push(goal.id.clone());
            } else {
                failed.push(goal.id.clone());
            }
        }
        state.completed_goals = completed;
        state.failed_goals = failed;
    }

    /// Whether a single goal currently holds.
    pub fn goal_achieved(&self, state: &ProgressState, goal: &Goal) -> bool {
        match &goal.goal_type {
            GoalType::DataCollection { required_fields } => required_fields
                .iter()
                .all(|f| state.collected.contains_key(f)),
            GoalType::BookingConfirmed => {
                state.booking_confirmed()
                    || state.flow_state == FlowState::Confirmation
                    || state.last_intent() == Some(AgentIntent::ConfirmingBooking)
            }
            GoalType::TransferInitiated => {
                state.transfer_initiated()
                    || state.flow_state == FlowState::Transfer
                    || state.last_intent() == Some(AgentIntent::InitiatingTransfer)
            }
            GoalType::ConversationEnded => {
                state.flow_state.is_terminal()
                    || state.last_intent() == Some(AgentIntent::SayingGoodbye)
            }
            GoalType::Custom { criteria } => self
                .custom_evaluators
                .get(criteria)
                .is_some_and(|eval| eval(state)),
        }
    }

    /// Whether every required goal currently holds.
    pub fn all_required_satisfied(&self, state: &ProgressState, goals: &[Goal]) -> bool {
        goals
            .iter()
            .filter(|g| g.required)
            .all(|g| state.completed_goals.contains(&g.id))
    }

    /// Build the per-goal results reported in the final test artifact.
    pub fn final_goal_results(&self, state: &ProgressState, goals: &[Goal]) -> Vec<GoalResult> {
        goals
            .iter()
            .map(|goal| {
                let achieved = self.goal_achieved(state, goal);
                let (collected, missing) = match &goal.goal_type {
                    GoalType::DataCollection { required_fields } => {
                        let collected = required_fields
                            .iter()
                            .copied()
                            .filter(|f| state.collected.contains_key(f))
                            .collect();
                        let missing = required_fields
                            .iter()
                            .copied()
                            .filter(|f| !state.collected.contains_key(f))
                            .collect();
                        (collected, missing)
                    }
                    _ => (Vec::new(), Vec::new()),
                };
                GoalResult {
                    goal_id: goal.id.clone(),
                    achieved,
                    required: goal.required,
                    collected,
                    missing,
                }
            })
            .collect()
    }
}
