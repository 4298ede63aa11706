//! Shared fixtures and scripted test doubles for integration tests.
//!
//! Agent and language-model doubles here are deterministic: the scripted
//! agent replays a fixed reply sequence, and the offline provider always
//! fails so intent detection exercises the keyword fallback path.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use patter::domain::models::{
    CommunicationStyle, DatabaseConfig, DetectorConfig, EdgeCaseDisposition, FieldKey, Goal,
    GoalTestCase, GoalTestResult, GoalType, LlmConfig, Persona, ResponseConfig, RunnerConfig,
    TestStatus,
};
use patter::domain::ports::{
    AgentClient, AgentClientError, AgentReply, LlmProvider, LlmRequest, LlmResponse,
    ProgressEvent, ProgressListener,
};
use patter::infrastructure::database::{DatabaseConnection, SqliteRunStore};
use patter::services::{GoalTestRunner, IntentDetector, ProgressTracker};

/// Agent double that replays a fixed sequence of replies, then errors.
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(ToString::to_string).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    async fn send(&self, _message: &str, _session_id: &str) -> Result<AgentReply, AgentClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().expect("script lock").pop_front() {
            Some(text) => Ok(AgentReply {
                text,
                tool_calls: Vec::new(),
            }),
            None => Err(AgentClientError::Transport("script exhausted".to_string())),
        }
    }
}

/// Agent double that answers every message with the same reply.
pub struct ConstantAgent(pub String);

impl ConstantAgent {
    pub fn booking() -> Self {
        Self("You're all booked for Tuesday. Have a great day!".to_string())
    }
}

#[async_trait]
impl AgentClient for ConstantAgent {
    async fn send(&self, _message: &str, _session_id: &str) -> Result<AgentReply, AgentClientError> {
        Ok(AgentReply {
            text: self.0.clone(),
            tool_calls: Vec::new(),
        })
    }
}

/// Agent double whose every call fails at the transport layer.
#[derive(Default)]
pub struct FailingAgent {
    calls: AtomicUsize,
}

impl FailingAgent {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentClient for FailingAgent {
    async fn send(&self, _message: &str, _session_id: &str) -> Result<AgentReply, AgentClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AgentClientError::Transport("connection refused".to_string()))
    }
}

/// Provider double that is always down, forcing keyword-based detection.
pub struct OfflineLlm;

#[async_trait]
impl LlmProvider for OfflineLlm {
    async fn complete(&self, _request: LlmRequest) -> LlmResponse {
        LlmResponse::failure("provider offline", 1)
    }

    async fn is_available(&self) -> bool {
        false
    }
}

/// Listener that records every event for later assertions.
#[derive(Default)]
pub struct CollectingListener {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingListener {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

impl ProgressListener for CollectingListener {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().expect("events lock").push(event.clone());
    }
}

/// A cooperative, terse caller whose answers are the bare field values.
pub fn persona() -> Persona {
    Persona {
        parent_name: "Dana Reyes".to_string(),
        callback_number: "555-0132".to_string(),
        child_name: "Milo".to_string(),
        child_dob: "March 4th, 2019".to_string(),
        visit_reason: "persistent cough".to_string(),
        medical_history: "mild asthma, no surgeries".to_string(),
        insurance_provider: "Blue Shield".to_string(),
        special_needs: "none".to_string(),
        style: CommunicationStyle::Terse,
        disposition: EdgeCaseDisposition::Cooperative,
    }
}

pub fn data_goal(id: &str, fields: Vec<FieldKey>) -> Goal {
    Goal {
        id: id.to_string(),
        goal_type: GoalType::DataCollection {
            required_fields: fields,
        },
        required: true,
        priority: 1,
    }
}

pub fn booking_goal(id: &str) -> Goal {
    Goal {
        id: id.to_string(),
        goal_type: GoalType::BookingConfirmed,
        required: true,
        priority: 1,
    }
}

pub fn case_with_goals(id: &str, goals: Vec<Goal>) -> GoalTestCase {
    GoalTestCase {
        id: id.to_string(),
        persona: persona(),
        goals,
        constraints: Vec::new(),
        response_config: ResponseConfig::default(),
        initial_message: None,
    }
}

/// Runner config tuned for fast, single-attempt test runs.
pub fn quick_runner_config() -> RunnerConfig {
    RunnerConfig {
        max_turns: 10,
        call_timeout_secs: 5,
        retry_on_timeout: false,
        persist_snapshots: false,
        abort_on_critical: false,
    }
}

/// A completed test result with fixed turn and duration numbers.
pub fn completed_result(test_id: &str, passed: bool) -> GoalTestResult {
    GoalTestResult {
        test_id: test_id.to_string(),
        passed,
        status: TestStatus::Completed,
        goal_results: Vec::new(),
        constraint_violations: Vec::new(),
        transcript: Vec::new(),
        turn_count: 8,
        duration_ms: 4200,
        issues: Vec::new(),
        stop_reason: "goals-satisfied".to_string(),
        error_message: None,
    }
}

pub async fn memory_db() -> DatabaseConnection {
    DatabaseConnection::new(&DatabaseConfig {
        path: ":memory:".to_string(),
        max_connections: 1,
    })
    .await
    .expect("in-memory database")
}

/// A fully wired runner over an in-memory store, keyword-only detection,
/// and the given agent double.
pub struct RunnerHarness {
    pub runner: Arc<GoalTestRunner>,
    pub store: Arc<SqliteRunStore>,
}

pub async fn runner_harness(agent: Arc<dyn AgentClient>, config: RunnerConfig) -> RunnerHarness {
    let conn = memory_db().await;
    let store = Arc::new(SqliteRunStore::new(conn.pool()));
    let detector = Arc::new(IntentDetector::new(
        Arc::new(OfflineLlm),
        LlmConfig::default(),
        &DetectorConfig::default(),
    ));
    let tracker = Arc::new(ProgressTracker::new(&DetectorConfig::default()));
    let runner = Arc::new(GoalTestRunner::new(
        agent,
        detector,
        tracker,
        store.clone(),
        config,
    ));
    RunnerHarness { runner, store }
}

pub fn run_id() -> Uuid {
    Uuid::new_v4()
}
