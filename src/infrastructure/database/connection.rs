use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::domain::models::DatabaseConfig;

/// Database connection pool manager
///
/// Manages a `SQLite` connection pool with WAL mode enabled for better
/// concurrency. Handles connection lifecycle and schema creation.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Create a new database connection pool with WAL mode enabled.
    ///
    /// # Configuration
    /// - Journal mode: WAL (Write-Ahead Logging)
    /// - Synchronous: NORMAL (good balance of safety and performance)
    /// - Foreign keys: Enabled
    /// - Busy timeout: 5 seconds
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = if config.path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .context("failed to create database directory")?;
                }
            }
            format!("sqlite:{}", config.path)
        };

        let options = SqliteConnectOptions::from_str(&url)
            .context("invalid database URL")?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        // An in-memory database is private to each connection, so the
        // pool must not grow beyond one.
        let max_connections = if config.path == ":memory:" {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .context("failed to open database connection pool")?;

        let conn = Self { pool };
        conn.create_schema().await?;
        Ok(conn)
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS test_results (
                run_id      TEXT NOT NULL,
                test_id     TEXT NOT NULL,
                passed      INTEGER NOT NULL,
                status      TEXT NOT NULL,
                payload     TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (run_id, test_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create test_results table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS progress_snapshots (
                run_id      TEXT NOT NULL,
                test_id     TEXT NOT NULL,
                turn        INTEGER NOT NULL,
                state       TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (run_id, test_id, turn)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create progress_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variants (
                variant_id          TEXT PRIMARY KEY,
                variant_type        TEXT NOT NULL,
                target_file         TEXT NOT NULL,
                content             TEXT NOT NULL,
                content_hash        TEXT NOT NULL,
                is_baseline         INTEGER NOT NULL DEFAULT 0,
                baseline_variant_id TEXT,
                created_at          TEXT NOT NULL,
                UNIQUE (target_file, content_hash)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create variants table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS experiments (
                experiment_id          TEXT PRIMARY KEY,
                name                   TEXT NOT NULL,
                hypothesis             TEXT NOT NULL,
                status                 TEXT NOT NULL,
                arms                   TEXT NOT NULL,
                test_ids               TEXT NOT NULL,
                min_sample_size        INTEGER NOT NULL,
                max_sample_size        INTEGER NOT NULL,
                significance_threshold REAL NOT NULL,
                winning_variant_id     TEXT,
                conclusion             TEXT,
                created_at             TEXT NOT NULL,
                updated_at             TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create experiments table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS experiment_runs (
                experiment_id TEXT NOT NULL,
                run_id        TEXT NOT NULL,
                test_id       TEXT NOT NULL,
                variant_id    TEXT NOT NULL,
                role          TEXT NOT NULL,
                metrics       TEXT NOT NULL,
                recorded_at   TEXT NOT NULL,
                PRIMARY KEY (run_id, test_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create experiment_runs table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_results_test ON test_results (test_id, recorded_at)",
        )
        .execute(&self.pool)
        .await
        .context("failed to create test_results index")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_exp_runs ON experiment_runs (experiment_id)",
        )
        .execute(&self.pool)
        .await
        .context("failed to create experiment_runs index")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_schema_creates() {
        let config = DatabaseConfig {
            path: ":memory:".to_string(),
            max_connections: 1,
        };
        let conn = DatabaseConnection::new(&config).await.unwrap();
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&conn.pool())
                .await
                .unwrap();
        assert!(count >= 5);
    }
}
