//! Port for persisting variants, experiments, and experiment runs.

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::StoreError;
use crate::domain::models::{Experiment, ExperimentRun, Variant};

/// Persistent store for the experiment lifecycle.
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Insert a variant unless content with the same hash already exists
    /// for the target file; returns the stored (possibly pre-existing)
    /// variant.
    async fn upsert_variant(&self, variant: &Variant) -> Result<Variant, StoreError>;

    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<Variant>, StoreError>;

    /// Current baseline variant for a target file, if one is marked.
    async fn baseline_for(&self, target_file: &str) -> Result<Option<Variant>, StoreError>;

    /// Mark a variant as the baseline for its target file, clearing the
    /// previous baseline flag.
    async fn set_baseline(&self, variant_id: Uuid) -> Result<(), StoreError>;

    async fn insert_experiment(&self, experiment: &Experiment) -> Result<(), StoreError>;

    async fn update_experiment(&self, experiment: &Experiment) -> Result<(), StoreError>;

    async fn get_experiment(&self, experiment_id: Uuid)
        -> Result<Option<Experiment>, StoreError>;

    async fn list_experiments(&self) -> Result<Vec<Experiment>, StoreError>;

    /// Append one experiment run. Idempotent per `(run_id, test_id)`.
    async fn append_run(&self, run: &ExperimentRun) -> Result<(), StoreError>;

    /// All recorded runs for one experiment.
    async fn runs_for_experiment(
        &self,
        experiment_id: Uuid,
    ) -> Result<Vec<ExperimentRun>, StoreError>;
}
