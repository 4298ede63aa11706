//! Parallel test execution.
//!
//! Owns a FIFO queue of test cases and a bounded pool of workers. Each
//! worker holds an exclusive conversation session identity and drives its
//! own runs sequentially; across workers, runs are fully independent.
//! Aborting halts queue draw; in-flight tests finish first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{GoalTestCase, GoalTestResult, OrchestratorConfig};
use crate::domain::ports::{
    ProgressCounters, ProgressEvent, ProgressListener, WorkerState,
};
use crate::services::goal_runner::GoalTestRunner;

/// Shared mutable execution state across workers.
struct ExecutionState {
    queue: Mutex<VecDeque<GoalTestCase>>,
    results: Mutex<Vec<GoalTestResult>>,
    counters: Mutex<ProgressCounters>,
}

/// Fans test execution out across a worker pool.
pub struct TestOrchestrator {
    runner: Arc<GoalTestRunner>,
    config: OrchestratorConfig,
    abort_flag: Arc<AtomicBool>,
}

impl TestOrchestrator {
    pub fn new(runner: Arc<GoalTestRunner>, config: OrchestratorConfig) -> Self {
        Self {
            runner,
            config,
            abort_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that lets an external caller halt queue draw. Workers
    /// finish their current test before stopping.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort_flag)
    }

    /// Run every queued test case and return one result per case, in
    /// completion order. Every submitted case yields exactly one result.
    #[instrument(skip(self, tests, listener), fields(total = tests.len()))]
    pub async fn run_suite(
        &self,
        tests: Vec<GoalTestCase>,
        listener: Arc<dyn ProgressListener>,
    ) -> Vec<GoalTestResult> {
        let total = tests.len();
        let workers = self.config.max_workers.max(1).min(total.max(1));

        listener.on_event(&ProgressEvent::ExecutionStarted { total, workers });

        let state = Arc::new(ExecutionState {
            queue: Mutex::new(tests.into_iter().collect()),
            results: Mutex::new(Vec::with_capacity(total)),
            counters: Mutex::new(ProgressCounters {
                total,
                ..ProgressCounters::default()
            }),
        });

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let state = Arc::clone(&state);
            let runner = Arc::clone(&self.runner);
            let listener = Arc::clone(&listener);
            let abort_flag = Arc::clone(&self.abort_flag);

            handles.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, state, runner, listener, abort_flag).await;
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                // A panicking worker loses only its own slot; queued tests
                // are still claimed by surviving workers.
                warn!(%err, "worker task panicked");
            }
        }

        let counters = *state.counters.lock().expect("counters lock");
        listener.on_event(&ProgressEvent::ExecutionCompleted { counters });
        info!(
            completed = counters.completed,
            passed = counters.passed,
            failed = counters.failed,
            errored = counters.errored,
            "suite finished"
        );

        match Arc::try_unwrap(state) {
            Ok(state) => state.results.into_inner().expect("results lock"),
            Err(state) => state.results.lock().expect("results lock").clone(),
        }
    }

    async fn worker_loop(
        worker_id: usize,
        state: Arc<ExecutionState>,
        runner: Arc<GoalTestRunner>,
        listener: Arc<dyn ProgressListener>,
        abort_flag: Arc<AtomicBool>,
    ) {
        loop {
            if abort_flag.load(Ordering::SeqCst) {
                break;
            }

            // Claim under the lock: each test is taken by exactly one worker.
            let test = state.queue.lock().expect("queue lock").pop_front();
            let Some(test) = test else { break };

            listener.on_event(&ProgressEvent::WorkerStatus {
                worker_id,
                state: WorkerState::Running,
                test_id: Some(test.id.clone()),
            });

            // Session identity is exclusive to this worker and this test;
            // the remote agent keeps per-session state.
            let session_id = format!("w{worker_id}-{}", Uuid::new_v4());
            let run_id = Uuid::new_v4();
            let result = runner.run(&test, &session_id, run_id).await;

            let counters = {
                let mut counters = state.counters.lock().expect("counters lock");
                counters.completed += 1;
                if result.passed {
                    counters.passed += 1;
                } else {
                    counters.failed += 1;
                }
                if result.status == crate::domain::models::TestStatus::Error {
                    counters.errored += 1;
                }
                *counters
            };

            listener.on_event(&ProgressEvent::TestCompleted {
                test_id: result.test_id.clone(),
                passed: result.passed,
                counters,
            });

            state.results.lock().expect("results lock").push(result);

            listener.on_event(&ProgressEvent::WorkerStatus {
                worker_id,
                state: WorkerState::Idle,
                test_id: None,
            });
        }

        listener.on_event(&ProgressEvent::WorkerStatus {
            worker_id,
            state: WorkerState::Stopped,
            test_id: None,
        });
    }
}
