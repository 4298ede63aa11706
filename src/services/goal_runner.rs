//! Per-conversation control loop.
//!
//! Drives one simulated run end to end: send the opening message, then
//! alternate intent detection, persona-driven reply synthesis, and
//! progress updates until a stop condition is hit. Stop conditions are
//! checked in a fixed order: turn ceiling, terminal intent, all required
//! goals satisfied.
//!
//! Under an experiment context the runner applies a variant's content for
//! the duration of the run through a `VariantLease`, which restores the
//! prior content on every exit path.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{
    ConstraintSeverity, ConversationTurn, GoalTestCase, GoalTestResult, ProgressState,
    RunnerConfig, TestStatus, Variant,
};
use crate::domain::ports::{AgentClient, AgentClientError, ContentPatcher, PatchError, RunStore};
use crate::services::intent_detector::IntentDetector;
use crate::services::persona_responder::PersonaResponder;
use crate::services::progress_tracker::ProgressTracker;

/// Why the control loop stopped.
const STOP_MAX_TURNS: &str = "max-turns-reached";
const STOP_GOALS_SATISFIED: &str = "goals-satisfied";

/// Scoped temporary application of a variant's content.
///
/// Acquiring the lease applies the content; `release` restores the prior
/// content. The runner always calls `release` on every exit path, and the
/// `Drop` backstop loudly reports a lease that was never released.
pub struct VariantLease {
    patcher: Arc<dyn ContentPatcher>,
    target_file: String,
    released: bool,
}

impl VariantLease {
    pub async fn acquire(
        patcher: Arc<dyn ContentPatcher>,
        variant: &Variant,
    ) -> Result<Self, PatchError> {
        patcher
            .apply_temporary(&variant.target_file, &variant.content)
            .await?;
        Ok(Self {
            patcher,
            target_file: variant.target_file.clone(),
            released: false,
        })
    }

    /// Roll the target file back to its pre-apply content.
    pub async fn release(mut self) -> Result<(), PatchError> {
        self.released = true;
        self.patcher.rollback(&self.target_file).await
    }
}

impl Drop for VariantLease {
    fn drop(&mut self) {
        if !self.released {
            // Rollback is async and cannot run here; this path indicates a
            // bug in the caller.
            tracing::error!(
                target_file = %self.target_file,
                "variant lease dropped without release; target file left modified"
            );
        }
    }
}

/// Runs one goal-oriented conversation against the agent under test.
pub struct GoalTestRunner {
    agent: Arc<dyn AgentClient>,
    detector: Arc<IntentDetector>,
    tracker: Arc<ProgressTracker>,
    run_store: Arc<dyn RunStore>,
    config: RunnerConfig,
}

impl GoalTestRunner {
    pub fn new(
        agent: Arc<dyn AgentClient>,
        detector: Arc<IntentDetector>,
        tracker: Arc<ProgressTracker>,
        run_store: Arc<dyn RunStore>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            agent,
            detector,
            tracker,
            run_store,
            config,
        }
    }

    /// Execute one run. Never fails: any unrecoverable error becomes an
    /// error-status result so a submitted test case is never dropped.
    #[instrument(skip(self, test), fields(test_id = %test.id, session_id))]
    pub async fn run(&self, test: &GoalTestCase, session_id: &str, run_id: Uuid) -> GoalTestResult {
        let result = self.execute(test, session_id, run_id).await;
        if let Err(err) = self.run_store.record_result(run_id, &result).await {
            warn!(%err, "failed to persist test result");
        }
        result
    }

    /// Execute one run with a variant temporarily applied. The lease is
    /// released on every path before the result is returned.
    #[instrument(skip(self, test, patcher, variant), fields(test_id = %test.id, variant_id = %variant.variant_id))]
    pub async fn run_with_variant(
        &self,
        test: &GoalTestCase,
        session_id: &str,
        run_id: Uuid,
        variant: &Variant,
        patcher: Arc<dyn ContentPatcher>,
    ) -> GoalTestResult {
        let lease = match VariantLease::acquire(patcher, variant).await {
            Ok(lease) => lease,
            Err(err) => {
                warn!(%err, "variant apply failed");
                return GoalTestResult::from_error(&test.id, format!("variant apply failed: {err}"));
            }
        };

        // `run` is infallible by construction, so the release below is
        // reached on every path, including runs that ended in an error
        // result.
        let mut result = self.run(test, session_id, run_id).await;

        if let Err(err) = lease.release().await {
            warn!(%err, "variant rollback failed");
            result.status = TestStatus::Error;
            result.passed = false;
            result.error_message = Some(format!("variant rollback failed: {err}"));
        }
        result
    }

    async fn execute(&self, test: &GoalTestCase, session_id: &str, run_id: Uuid) -> GoalTestResult {
        let started = Instant::now();
        let responder = PersonaResponder::new(test.persona.clone(), test.response_config.clone());

        let pending = test
            .goals
            .iter()
            .filter_map(|g| match &g.goal_type {
                crate::domain::models::GoalType::DataCollection { required_fields } => {
                    Some(required_fields.clone())
                }
                _ => None,
            })
            .flatten()
            .collect::<Vec<_>>();

        let mut state = ProgressState::new(pending);
        let mut transcript: Vec<ConversationTurn> = Vec::new();

        let opening = responder.opening_message(test.initial_message.as_deref());
        transcript.push(ConversationTurn::caller(opening.clone()));

        let mut agent_reply = match self.call_agent(&opening, session_id).await {
            Ok(reply) => reply,
            Err(err) => return self.finish_error(test, &state, transcript, started, err),
        };
        transcript.push(agent_reply.clone());

        let mut stop_reason = STOP_MAX_TURNS.to_string();

        for turn in 1..=self.config.max_turns {
            let detection = self
                .detector
                .detect(&agent_reply.content, &transcript, &state.pending)
                .await;
            debug!(
                turn,
                intent = detection.primary_intent.as_str(),
                confidence = detection.confidence,
                "intent detected"
            );

            if detection.primary_intent.is_terminal() {
                self.tracker.update(&mut state, &detection, "", turn, &test.goals);
                stop_reason = format!("terminal-intent:{}", detection.primary_intent.as_str());
                break;
            }

            let caller_reply = responder
                .reply_to(&detection)
                .unwrap_or_else(|| "Okay.".to_string());
            self.tracker
                .update(&mut state, &detection, &caller_reply, turn, &test.goals);

            if self.config.persist_snapshots {
                if let Err(err) = self
                    .run_store
                    .record_snapshot(run_id, &test.id, turn, &state)
                    .await
                {
                    warn!(%err, "failed to persist progress snapshot");
                }
            }

            if self.config.abort_on_critical {
                if let Some(violation) = test
                    .constraints
                    .iter()
                    .filter(|c| c.severity == ConstraintSeverity::Critical)
                    .find_map(|c| c.check(&state))
                {
                    stop_reason = format!("critical-constraint:{}", violation.constraint_id);
                    break;
                }
            }

            if self.tracker.all_required_satisfied(&state, &test.goals) {
                stop_reason = STOP_GOALS_SATISFIED.to_string();
                break;
            }

            transcript.push(ConversationTurn::caller(caller_reply.clone()));
            agent_reply = match self.call_agent(&caller_reply, session_id).await {
                Ok(reply) => reply,
                Err(err) => return self.finish_error(test, &state, transcript, started, err),
            };
            transcript.push(agent_reply.clone());
        }

        self.finish(test, state, transcript, started, stop_reason)
    }

    /// One agent call with timeout, retried at most once when configured.
    async fn call_agent(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<ConversationTurn, String> {
        match self.call_agent_once(message, session_id).await {
            Ok(turn) => Ok(turn),
            Err(first_err) if self.config.retry_on_timeout => {
                warn!(%first_err, "agent call failed, retrying once");
                self.call_agent_once(message, session_id)
                    .await
                    .map_err(|retry_err| format!("{first_err}; retry: {retry_err}"))
            }
            Err(err) => Err(err),
        }
    }

    async fn call_agent_once(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<ConversationTurn, String> {
        let call_started = Instant::now();
        let deadline = Duration::from_secs(self.config.call_timeout_secs);

        let reply = timeout(deadline, self.agent.send(message, session_id))
            .await
            .map_err(|_| {
                AgentClientError::Timeout(self.config.call_timeout_secs).to_string()
            })?
            .map_err(|e| e.to_string())?;

        if !reply.tool_calls.is_empty() {
            // Opaque metadata: logged, never interpreted.
            debug!(tool_calls = reply.tool_calls.len(), "agent reply carried tool calls");
        }

        Ok(ConversationTurn::agent(
            reply.text,
            call_started.elapsed().as_millis() as u64,
        ))
    }

    fn finish(
        &self,
        test: &GoalTestCase,
        state: ProgressState,
        transcript: Vec<ConversationTurn>,
        started: Instant,
        stop_reason: String,
    ) -> GoalTestResult {
        let goal_results = self.tracker.final_goal_results(&state, &test.goals);
        let constraint_violations: Vec<_> = test
            .constraints
            .iter()
            .filter_map(|c| c.check(&state))
            .collect();

        let required_ok = goal_results
            .iter()
            .filter(|g| g.required)
            .all(|g| g.achieved);
        let blocking_violation = constraint_violations.iter().any(|v| {
            matches!(
                v.severity,
                ConstraintSeverity::Error | ConstraintSeverity::Critical
            )
        });
        let passed = required_ok && !blocking_violation && stop_reason != STOP_MAX_TURNS;

        info!(
            test_id = %test.id,
            passed,
            turns = state.turn_number,
            %stop_reason,
            "run finished"
        );

        GoalTestResult {
            test_id: test.id.clone(),
            passed,
            status: TestStatus::Completed,
            goal_results,
            constraint_violations,
            turn_count: state.turn_number,
            duration_ms: started.elapsed().as_millis() as u64,
            issues: state.issues.clone(),
            transcript,
            stop_reason,
            error_message: None,
        }
    }

    fn finish_error(
        &self,
        test: &GoalTestCase,
        state: &ProgressState,
        transcript: Vec<ConversationTurn>,
        started: Instant,
        error: String,
    ) -> GoalTestResult {
        warn!(test_id = %test.id, %error, "run aborted on transport failure");
        let mut result = GoalTestResult::from_error(&test.id, error);
        result.goal_results = self.tracker.final_goal_results(state, &test.goals);
        result.turn_count = state.turn_number;
        result.duration_ms = started.elapsed().as_millis() as u64;
        result.issues = state.issues.clone();
        result.transcript = transcript;
        result
    }
}
