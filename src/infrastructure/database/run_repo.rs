use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::models::{GoalTestResult, ProgressState};
use crate::domain::ports::{RunStore, StoreError};

/// SQLite implementation of `RunStore` using sqlx.
///
/// Results and snapshots are stored as JSON payloads keyed by
/// `(run_id, test_id)`; `INSERT OR REPLACE` makes retried writes
/// idempotent.
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_result(row: &sqlx::sqlite::SqliteRow) -> Result<GoalTestResult, StoreError> {
        let payload: String = row.get("payload");
        Ok(serde_json::from_str(&payload)?)
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn record_result(
        &self,
        run_id: Uuid,
        result: &GoalTestResult,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(result)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO test_results
                (run_id, test_id, passed, status, payload, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id.to_string())
        .bind(&result.test_id)
        .bind(i64::from(result.passed))
        .bind(match result.status {
            crate::domain::models::TestStatus::Completed => "completed",
            crate::domain::models::TestStatus::Error => "error",
        })
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(%run_id, test_id = %result.test_id, "result recorded");
        Ok(())
    }

    async fn record_snapshot(
        &self,
        run_id: Uuid,
        test_id: &str,
        turn: u32,
        state: &ProgressState,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO progress_snapshots
                (run_id, test_id, turn, state, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id.to_string())
        .bind(test_id)
        .bind(i64::from(turn))
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_result(
        &self,
        run_id: Uuid,
        test_id: &str,
    ) -> Result<Option<GoalTestResult>, StoreError> {
        let row = sqlx::query(
            "SELECT payload FROM test_results WHERE run_id = ? AND test_id = ?",
        )
        .bind(run_id.to_string())
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_result).transpose()
    }

    async fn recent_results(
        &self,
        test_id: &str,
        limit: u32,
    ) -> Result<Vec<GoalTestResult>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM test_results
            WHERE test_id = ?
            ORDER BY recorded_at DESC
            LIMIT ?
            "#,
        )
        .bind(test_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DatabaseConfig, TestStatus};
    use crate::infrastructure::database::DatabaseConnection;

    async fn store() -> SqliteRunStore {
        let conn = DatabaseConnection::new(&DatabaseConfig {
            path: ":memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        SqliteRunStore::new(conn.pool())
    }

    fn result(test_id: &str, passed: bool) -> GoalTestResult {
        GoalTestResult {
            test_id: test_id.to_string(),
            passed,
            status: TestStatus::Completed,
            goal_results: vec![],
            constraint_violations: vec![],
            transcript: vec![],
            turn_count: 5,
            duration_ms: 900,
            issues: vec![],
            stop_reason: "goals-satisfied".to_string(),
            error_message: None,
        }
    }

    #[tokio::test]
    async fn result_round_trips() {
        let store = store().await;
        let run_id = Uuid::new_v4();
        store.record_result(run_id, &result("t1", true)).await.unwrap();

        let loaded = store.get_result(run_id, "t1").await.unwrap().unwrap();
        assert!(loaded.passed);
        assert_eq!(loaded.turn_count, 5);
        assert_eq!(loaded.stop_reason, "goals-satisfied");
    }

    #[tokio::test]
    async fn rerecording_same_run_is_idempotent() {
        let store = store().await;
        let run_id = Uuid::new_v4();
        store.record_result(run_id, &result("t1", false)).await.unwrap();
        store.record_result(run_id, &result("t1", true)).await.unwrap();

        let all = store.recent_results("t1", 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].passed, "the rewrite should win");
    }

    #[tokio::test]
    async fn recent_results_respects_limit() {
        let store = store().await;
        for _ in 0..5 {
            store
                .record_result(Uuid::new_v4(), &result("t1", true))
                .await
                .unwrap();
        }
        let recent = store.recent_results("t1", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
    }

    #[tokio::test]
    async fn snapshots_persist_per_turn() {
        let store = store().await;
        let run_id = Uuid::new_v4();
        let state = ProgressState::new(vec![]);
        store.record_snapshot(run_id, "t1", 1, &state).await.unwrap();
        store.record_snapshot(run_id, "t1", 2, &state).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM progress_snapshots WHERE run_id = ?")
                .bind(run_id.to_string())
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(count, 2);
    }
}
