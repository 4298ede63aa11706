//! Progress events emitted by the orchestrator.
//!
//! Events are for live observation only; they are never persisted.

use serde::Serialize;

/// Aggregate counters carried by progress events.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProgressCounters {
    pub total: usize,
    pub completed: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

/// What a worker is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Stopped,
}

/// Live execution events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    ExecutionStarted {
        total: usize,
        workers: usize,
    },
    WorkerStatus {
        worker_id: usize,
        state: WorkerState,
        test_id: Option<String>,
    },
    TestCompleted {
        test_id: String,
        passed: bool,
        counters: ProgressCounters,
    },
    ExecutionCompleted {
        counters: ProgressCounters,
    },
}

/// Caller-supplied listener for live progress.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Listener that discards everything.
pub struct NullListener;

impl ProgressListener for NullListener {
    fn on_event(&self, _event: &ProgressEvent) {}
}
