//! Port for persisting test results and progress snapshots.

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::StoreError;
use crate::domain::models::{GoalTestResult, ProgressState};

/// Persistent store for run artifacts.
///
/// Writes are idempotent per `(run_id, test_id)` so a retry after a
/// timeout never produces duplicate rows.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Record (or re-record) a test result, including its transcript.
    async fn record_result(&self, run_id: Uuid, result: &GoalTestResult)
        -> Result<(), StoreError>;

    /// Persist a mid-run progress snapshot for later inspection.
    async fn record_snapshot(
        &self,
        run_id: Uuid,
        test_id: &str,
        turn: u32,
        state: &ProgressState,
    ) -> Result<(), StoreError>;

    /// Fetch one recorded result.
    async fn get_result(
        &self,
        run_id: Uuid,
        test_id: &str,
    ) -> Result<Option<GoalTestResult>, StoreError>;

    /// Most recent N results for a test id, newest first. Used by
    /// regression and pass-rate-drop detection.
    async fn recent_results(
        &self,
        test_id: &str,
        limit: u32,
    ) -> Result<Vec<GoalTestResult>, StoreError>;
}
