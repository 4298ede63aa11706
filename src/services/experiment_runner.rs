//! Test execution under an experiment.
//!
//! Composes the pieces of the experiment data-collection loop: pick an
//! arm by traffic weight, apply its content for the duration of one run,
//! execute the conversation, record the outcome as an experiment sample,
//! and restore the prior content. Arms of one experiment share a target
//! file, so runs execute strictly sequentially.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::models::{ExperimentStatus, GoalTestCase, GoalTestResult, TestStatus};
use crate::domain::ports::{ContentPatcher, ProgressCounters, ProgressEvent, ProgressListener};
use crate::services::experiment_service::{ExperimentService, ExperimentServiceError};
use crate::services::goal_runner::GoalTestRunner;

/// Drives a test suite as experiment samples.
pub struct ExperimentRunner {
    runner: Arc<GoalTestRunner>,
    service: Arc<ExperimentService>,
    patcher: Arc<dyn ContentPatcher>,
}

impl ExperimentRunner {
    pub fn new(
        runner: Arc<GoalTestRunner>,
        service: Arc<ExperimentService>,
        patcher: Arc<dyn ContentPatcher>,
    ) -> Self {
        Self {
            runner,
            service,
            patcher,
        }
    }

    /// Run every applicable test case as one sample of the experiment.
    ///
    /// The experiment must be running. When it declares test ids, cases
    /// outside that set are skipped. Each run selects an arm by traffic
    /// weight and executes with that arm's content applied; the control
    /// arm's content is applied too, so every sample runs exactly the
    /// stored variant content even if the live file has drifted.
    #[instrument(skip(self, tests, listener), fields(%experiment_id, total = tests.len()))]
    pub async fn run_suite(
        &self,
        experiment_id: Uuid,
        tests: Vec<GoalTestCase>,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<Vec<GoalTestResult>, ExperimentServiceError> {
        let experiment = self.service.get(experiment_id).await?;
        if experiment.status != ExperimentStatus::Running {
            return Err(ExperimentServiceError::NotRunning {
                experiment_id,
                status: experiment.status,
            });
        }

        let tests: Vec<GoalTestCase> = if experiment.test_ids.is_empty() {
            tests
        } else {
            tests
                .into_iter()
                .filter(|t| experiment.test_ids.contains(&t.id))
                .collect()
        };

        let total = tests.len();
        // One target file can hold only one variant at a time.
        listener.on_event(&ProgressEvent::ExecutionStarted { total, workers: 1 });

        let mut counters = ProgressCounters {
            total,
            ..ProgressCounters::default()
        };
        let mut results = Vec::with_capacity(total);

        for test in &tests {
            let variant_id = self.service.select_variant(&experiment);
            let variant = self.service.variant(variant_id).await?;

            let run_id = Uuid::new_v4();
            let session_id = format!("exp-{experiment_id}-{run_id}");
            let result = self
                .runner
                .run_with_variant(test, &session_id, run_id, &variant, Arc::clone(&self.patcher))
                .await;
            self.service
                .record_run(experiment_id, variant_id, run_id, &result)
                .await?;

            counters.completed += 1;
            if result.passed {
                counters.passed += 1;
            } else {
                counters.failed += 1;
            }
            if result.status == TestStatus::Error {
                counters.errored += 1;
            }
            listener.on_event(&ProgressEvent::TestCompleted {
                test_id: result.test_id.clone(),
                passed: result.passed,
                counters,
            });
            results.push(result);
        }

        listener.on_event(&ProgressEvent::ExecutionCompleted { counters });
        info!(
            completed = counters.completed,
            passed = counters.passed,
            failed = counters.failed,
            errored = counters.errored,
            "experiment suite finished"
        );
        Ok(results)
    }
}
