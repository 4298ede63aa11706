use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::models::{
    ArmRole, Experiment, ExperimentRun, ExperimentStatus, Variant, VariantType,
};
use crate::domain::ports::{ExperimentStore, StoreError};

/// SQLite implementation of `ExperimentStore` using sqlx.
///
/// Variants are content-addressed: the `(target_file, content_hash)`
/// unique index backs the dedup contract of `upsert_variant`. Arms,
/// test ids, and run metrics are stored as JSON columns.
pub struct SqliteExperimentStore {
    pool: SqlitePool,
}

impl SqliteExperimentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_variant(row: &sqlx::sqlite::SqliteRow) -> Result<Variant, StoreError> {
        let variant_type = VariantType::from_str(&row.get::<String, _>("variant_type"))
            .ok_or_else(|| StoreError::Serialization("unknown variant type".to_string()))?;
        Ok(Variant {
            variant_id: parse_uuid(&row.get::<String, _>("variant_id"))?,
            variant_type,
            target_file: row.get("target_file"),
            content: row.get("content"),
            content_hash: row.get("content_hash"),
            is_baseline: row.get::<i64, _>("is_baseline") != 0,
            baseline_variant_id: row
                .get::<Option<String>, _>("baseline_variant_id")
                .as_deref()
                .and_then(|s| Uuid::parse_str(s).ok()),
            created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        })
    }

    fn row_to_experiment(row: &sqlx::sqlite::SqliteRow) -> Result<Experiment, StoreError> {
        let status = ExperimentStatus::from_str(&row.get::<String, _>("status"))
            .ok_or_else(|| StoreError::Serialization("unknown experiment status".to_string()))?;
        Ok(Experiment {
            experiment_id: parse_uuid(&row.get::<String, _>("experiment_id"))?,
            name: row.get("name"),
            hypothesis: row.get("hypothesis"),
            status,
            arms: serde_json::from_str(&row.get::<String, _>("arms"))?,
            test_ids: serde_json::from_str(&row.get::<String, _>("test_ids"))?,
            min_sample_size: row.get::<i64, _>("min_sample_size") as u32,
            max_sample_size: row.get::<i64, _>("max_sample_size") as u32,
            significance_threshold: row.get("significance_threshold"),
            winning_variant_id: row
                .get::<Option<String>, _>("winning_variant_id")
                .as_deref()
                .and_then(|s| Uuid::parse_str(s).ok()),
            conclusion: row.get("conclusion"),
            created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
            updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
        })
    }

    fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<ExperimentRun, StoreError> {
        let role = ArmRole::from_str(&row.get::<String, _>("role"))
            .ok_or_else(|| StoreError::Serialization("unknown arm role".to_string()))?;
        Ok(ExperimentRun {
            experiment_id: parse_uuid(&row.get::<String, _>("experiment_id"))?,
            run_id: parse_uuid(&row.get::<String, _>("run_id"))?,
            test_id: row.get("test_id"),
            variant_id: parse_uuid(&row.get::<String, _>("variant_id"))?,
            role,
            metrics: serde_json::from_str(&row.get::<String, _>("metrics"))?,
            recorded_at: parse_datetime(&row.get::<String, _>("recorded_at"))?,
        })
    }

    async fn write_experiment(&self, experiment: &Experiment) -> Result<(), StoreError> {
        let arms = serde_json::to_string(&experiment.arms)?;
        let test_ids = serde_json::to_string(&experiment.test_ids)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO experiments (
                experiment_id, name, hypothesis, status, arms, test_ids,
                min_sample_size, max_sample_size, significance_threshold,
                winning_variant_id, conclusion, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(experiment.experiment_id.to_string())
        .bind(&experiment.name)
        .bind(&experiment.hypothesis)
        .bind(experiment.status.as_str())
        .bind(&arms)
        .bind(&test_ids)
        .bind(i64::from(experiment.min_sample_size))
        .bind(i64::from(experiment.max_sample_size))
        .bind(experiment.significance_threshold)
        .bind(experiment.winning_variant_id.map(|id| id.to_string()))
        .bind(&experiment.conclusion)
        .bind(experiment.created_at.to_rfc3339())
        .bind(experiment.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ExperimentStore for SqliteExperimentStore {
    async fn upsert_variant(&self, variant: &Variant) -> Result<Variant, StoreError> {
        // Content-hash dedup: an existing row for the same target wins.
        let existing = sqlx::query(
            "SELECT * FROM variants WHERE target_file = ? AND content_hash = ?",
        )
        .bind(&variant.target_file)
        .bind(&variant.content_hash)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            let stored = Self::row_to_variant(&row)?;
            debug!(variant_id = %stored.variant_id, "variant content already stored");
            return Ok(stored);
        }

        sqlx::query(
            r#"
            INSERT INTO variants (
                variant_id, variant_type, target_file, content, content_hash,
                is_baseline, baseline_variant_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(variant.variant_id.to_string())
        .bind(variant.variant_type.as_str())
        .bind(&variant.target_file)
        .bind(&variant.content)
        .bind(&variant.content_hash)
        .bind(i64::from(variant.is_baseline))
        .bind(variant.baseline_variant_id.map(|id| id.to_string()))
        .bind(variant.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(variant.clone())
    }

    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<Variant>, StoreError> {
        let row = sqlx::query("SELECT * FROM variants WHERE variant_id = ?")
            .bind(variant_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_variant).transpose()
    }

    async fn baseline_for(&self, target_file: &str) -> Result<Option<Variant>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM variants WHERE target_file = ? AND is_baseline = 1",
        )
        .bind(target_file)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_variant).transpose()
    }

    async fn set_baseline(&self, variant_id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let target_file: Option<String> =
            sqlx::query_scalar("SELECT target_file FROM variants WHERE variant_id = ?")
                .bind(variant_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let target_file =
            target_file.ok_or_else(|| StoreError::NotFound(variant_id.to_string()))?;

        sqlx::query("UPDATE variants SET is_baseline = 0 WHERE target_file = ?")
            .bind(&target_file)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE variants SET is_baseline = 1 WHERE variant_id = ?")
            .bind(variant_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(%variant_id, %target_file, "baseline updated");
        Ok(())
    }

    async fn insert_experiment(&self, experiment: &Experiment) -> Result<(), StoreError> {
        self.write_experiment(experiment).await
    }

    async fn update_experiment(&self, experiment: &Experiment) -> Result<(), StoreError> {
        self.write_experiment(experiment).await
    }

    async fn get_experiment(
        &self,
        experiment_id: Uuid,
    ) -> Result<Option<Experiment>, StoreError> {
        let row = sqlx::query("SELECT * FROM experiments WHERE experiment_id = ?")
            .bind(experiment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_experiment).transpose()
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>, StoreError> {
        let rows = sqlx::query("SELECT * FROM experiments ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_experiment).collect()
    }

    async fn append_run(&self, run: &ExperimentRun) -> Result<(), StoreError> {
        let metrics = serde_json::to_string(&run.metrics)?;
        // INSERT OR IGNORE keeps the append idempotent per (run_id, test_id).
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO experiment_runs (
                experiment_id, run_id, test_id, variant_id, role, metrics, recorded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.experiment_id.to_string())
        .bind(run.run_id.to_string())
        .bind(&run.test_id)
        .bind(run.variant_id.to_string())
        .bind(run.role.as_str())
        .bind(&metrics)
        .bind(run.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn runs_for_experiment(
        &self,
        experiment_id: Uuid,
    ) -> Result<Vec<ExperimentRun>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM experiment_runs WHERE experiment_id = ? ORDER BY recorded_at ASC",
        )
        .bind(experiment_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_run).collect()
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Serialization(format!("invalid uuid '{s}': {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("invalid datetime '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        DatabaseConfig, ExperimentMetrics, VariantArm,
    };
    use crate::infrastructure::database::DatabaseConnection;

    async fn store() -> SqliteExperimentStore {
        let conn = DatabaseConnection::new(&DatabaseConfig {
            path: ":memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        SqliteExperimentStore::new(conn.pool())
    }

    fn variant(content: &str) -> Variant {
        Variant::new(VariantType::Prompt, "prompts/scheduling.md", content)
    }

    fn experiment(control: Uuid, treatment: Uuid) -> Experiment {
        Experiment::new(
            "exp",
            "treatment beats control",
            vec![
                VariantArm {
                    variant_id: control,
                    role: ArmRole::Control,
                    weight: 0.5,
                },
                VariantArm {
                    variant_id: treatment,
                    role: ArmRole::Treatment,
                    weight: 0.5,
                },
            ],
            vec!["t1".to_string()],
            20,
            50,
            0.05,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_content_returns_existing_variant() {
        let store = store().await;
        let first = store.upsert_variant(&variant("same content")).await.unwrap();
        let second = store.upsert_variant(&variant("same content")).await.unwrap();
        assert_eq!(first.variant_id, second.variant_id);

        let third = store.upsert_variant(&variant("other content")).await.unwrap();
        assert_ne!(first.variant_id, third.variant_id);
    }

    #[tokio::test]
    async fn set_baseline_clears_previous_flag() {
        let store = store().await;
        let a = store.upsert_variant(&variant("a")).await.unwrap();
        let b = store.upsert_variant(&variant("b")).await.unwrap();

        store.set_baseline(a.variant_id).await.unwrap();
        store.set_baseline(b.variant_id).await.unwrap();

        let baseline = store
            .baseline_for("prompts/scheduling.md")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(baseline.variant_id, b.variant_id);
        assert!(!store
            .get_variant(a.variant_id)
            .await
            .unwrap()
            .unwrap()
            .is_baseline);
    }

    #[tokio::test]
    async fn experiment_round_trips_through_json_columns() {
        let store = store().await;
        let exp = experiment(Uuid::new_v4(), Uuid::new_v4());
        store.insert_experiment(&exp).await.unwrap();

        let loaded = store
            .get_experiment(exp.experiment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name, "exp");
        assert_eq!(loaded.arms.len(), 2);
        assert_eq!(loaded.status, ExperimentStatus::Draft);
        assert_eq!(loaded.test_ids, vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn append_run_is_idempotent() {
        let store = store().await;
        let exp = experiment(Uuid::new_v4(), Uuid::new_v4());
        store.insert_experiment(&exp).await.unwrap();

        let run = ExperimentRun {
            experiment_id: exp.experiment_id,
            run_id: Uuid::new_v4(),
            test_id: "t1".to_string(),
            variant_id: exp.arms[0].variant_id,
            role: ArmRole::Control,
            metrics: ExperimentMetrics {
                passed: true,
                turn_count: 7,
                duration_ms: 3000,
                goal_completion_rate: 1.0,
                constraint_violations: 0,
                errored: false,
            },
            recorded_at: Utc::now(),
        };
        store.append_run(&run).await.unwrap();
        store.append_run(&run).await.unwrap();

        let runs = store.runs_for_experiment(exp.experiment_id).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].metrics.passed);
    }
}
