//! Experiment sample collection end to end: arm selection, temporary
//! content application, run execution, and sample recording.

mod common;

use std::sync::Arc;

use common::{booking_goal, case_with_goals, memory_db, quick_runner_config, runner_harness,
    CollectingListener, ConstantAgent};
use patter::domain::models::{
    ExperimentConfig, GoalTestCase, Variant, VariantType,
};
use patter::domain::ports::{ExperimentStore, ProgressEvent};
use patter::infrastructure::content::FileContentPatcher;
use patter::infrastructure::database::SqliteExperimentStore;
use patter::services::trigger_service::ExperimentRecommendation;
use patter::services::{ExperimentRunner, ExperimentService, ExperimentServiceError, ImpactLevel};
use tempfile::TempDir;
use uuid::Uuid;

const TARGET: &str = "prompts/scheduling.md";
const BASELINE_CONTENT: &str = "baseline scheduling prompt";

struct Fixture {
    _dir: TempDir,
    target_path: std::path::PathBuf,
    runner: ExperimentRunner,
    service: Arc<ExperimentService>,
    store: Arc<SqliteExperimentStore>,
    experiment_id: Uuid,
}

async fn fixture(test_ids: Vec<String>) -> Fixture {
    let dir = TempDir::new().unwrap();
    tokio::fs::create_dir_all(dir.path().join("prompts"))
        .await
        .unwrap();
    let target_path = dir.path().join(TARGET);
    tokio::fs::write(&target_path, BASELINE_CONTENT).await.unwrap();

    let conn = memory_db().await;
    let store = Arc::new(SqliteExperimentStore::new(conn.pool()));
    let mut baseline = Variant::new(VariantType::Prompt, TARGET, BASELINE_CONTENT);
    baseline.is_baseline = true;
    store.upsert_variant(&baseline).await.unwrap();

    let service = Arc::new(ExperimentService::new(
        store.clone(),
        ExperimentConfig::default(),
    ));
    let recommendation = ExperimentRecommendation {
        impact: ImpactLevel::High,
        hypothesis: "offering two concrete slots raises the booking rate".to_string(),
        target_file: TARGET.to_string(),
        variant_type: VariantType::Prompt,
        proposed_content: "offer two concrete times".to_string(),
        min_sample_size: 20,
    };
    let experiment = service
        .create_from_recommendation("slot fix", &recommendation, test_ids)
        .await
        .unwrap();

    let harness = runner_harness(Arc::new(ConstantAgent::booking()), quick_runner_config()).await;
    let patcher = Arc::new(FileContentPatcher::new(dir.path()));
    let runner = ExperimentRunner::new(harness.runner, service.clone(), patcher);

    Fixture {
        _dir: dir,
        target_path,
        runner,
        service,
        store,
        experiment_id: experiment.experiment_id,
    }
}

fn booking_cases(n: usize) -> Vec<GoalTestCase> {
    (0..n)
        .map(|i| case_with_goals(&format!("t{i}"), vec![booking_goal("booked")]))
        .collect()
}

#[tokio::test]
async fn runs_accrue_samples_and_restore_content() {
    let fixture = fixture(vec![]).await;
    fixture.service.start(fixture.experiment_id).await.unwrap();

    let listener = Arc::new(CollectingListener::default());
    let results = fixture
        .runner
        .run_suite(fixture.experiment_id, booking_cases(4), listener.clone())
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.passed));

    // Every run landed as exactly one sample on one of the arms.
    let runs = fixture
        .store
        .runs_for_experiment(fixture.experiment_id)
        .await
        .unwrap();
    assert_eq!(runs.len(), 4);
    let experiment = fixture.service.get(fixture.experiment_id).await.unwrap();
    assert!(runs
        .iter()
        .all(|r| experiment.arms.iter().any(|a| a.variant_id == r.variant_id)));

    let stats = fixture
        .service
        .variant_stats(fixture.experiment_id)
        .await
        .unwrap();
    let total: u32 = stats.iter().map(|s| s.sample_size).sum();
    assert_eq!(total, 4);

    // The target file is back to the baseline after the suite.
    let content = tokio::fs::read_to_string(&fixture.target_path).await.unwrap();
    assert_eq!(content, BASELINE_CONTENT);

    let events = listener.events();
    assert!(matches!(
        events.first(),
        Some(ProgressEvent::ExecutionStarted { total: 4, workers: 1 })
    ));
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::ExecutionCompleted { counters }) if counters.passed == 4
    ));
}

#[tokio::test]
async fn suite_is_rejected_unless_experiment_running() {
    let fixture = fixture(vec![]).await;

    let err = fixture
        .runner
        .run_suite(
            fixture.experiment_id,
            booking_cases(1),
            Arc::new(CollectingListener::default()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExperimentServiceError::NotRunning { .. }));

    let runs = fixture
        .store
        .runs_for_experiment(fixture.experiment_id)
        .await
        .unwrap();
    assert!(runs.is_empty());
}

#[tokio::test]
async fn declared_test_ids_filter_the_suite() {
    let fixture = fixture(vec!["t1".to_string()]).await;
    fixture.service.start(fixture.experiment_id).await.unwrap();

    let results = fixture
        .runner
        .run_suite(
            fixture.experiment_id,
            booking_cases(3),
            Arc::new(CollectingListener::default()),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].test_id, "t1");

    let runs = fixture
        .store
        .runs_for_experiment(fixture.experiment_id)
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].test_id, "t1");
}
