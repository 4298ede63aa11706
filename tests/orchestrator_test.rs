//! Worker-pool execution over a suite of scripted test cases.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{
    booking_goal, case_with_goals, quick_runner_config, runner_harness, CollectingListener,
    ConstantAgent,
};
use patter::domain::models::{GoalTestCase, OrchestratorConfig};
use patter::domain::ports::ProgressEvent;
use patter::services::TestOrchestrator;

fn suite(count: usize) -> Vec<GoalTestCase> {
    (0..count)
        .map(|i| case_with_goals(&format!("case-{i}"), vec![booking_goal("booked")]))
        .collect()
}

async fn orchestrator(max_workers: usize) -> TestOrchestrator {
    let harness = runner_harness(Arc::new(ConstantAgent::booking()), quick_runner_config()).await;
    TestOrchestrator::new(harness.runner, OrchestratorConfig { max_workers })
}

#[tokio::test]
async fn every_submitted_case_yields_exactly_one_result() {
    let orchestrator = orchestrator(3).await;
    let listener = Arc::new(CollectingListener::default());

    let results = orchestrator.run_suite(suite(8), listener.clone()).await;

    assert_eq!(results.len(), 8);
    let ids: HashSet<&str> = results.iter().map(|r| r.test_id.as_str()).collect();
    assert_eq!(ids.len(), 8, "duplicate or missing test ids: {ids:?}");
    assert!(results.iter().all(|r| r.passed));

    let events = listener.events();
    assert!(matches!(
        events.first(),
        Some(ProgressEvent::ExecutionStarted { total: 8, workers: 3 })
    ));
    match events.last() {
        Some(ProgressEvent::ExecutionCompleted { counters }) => {
            assert_eq!(counters.completed, 8);
            assert_eq!(counters.passed, 8);
            assert_eq!(counters.failed, 0);
        }
        other => panic!("expected ExecutionCompleted, got {other:?}"),
    }
}

#[tokio::test]
async fn worker_count_never_exceeds_suite_size() {
    let orchestrator = orchestrator(10).await;
    let listener = Arc::new(CollectingListener::default());

    let results = orchestrator.run_suite(suite(2), listener.clone()).await;

    assert_eq!(results.len(), 2);
    assert!(matches!(
        listener.events().first(),
        Some(ProgressEvent::ExecutionStarted { total: 2, workers: 2 })
    ));
}

#[tokio::test]
async fn completed_counters_reach_every_test_event() {
    let orchestrator = orchestrator(2).await;
    let listener = Arc::new(CollectingListener::default());

    orchestrator.run_suite(suite(4), listener.clone()).await;

    let completions: Vec<usize> = listener
        .events()
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::TestCompleted { counters, .. } => Some(counters.completed),
            _ => None,
        })
        .collect();
    // Snapshots are taken under the counters lock, so each completion
    // carries a distinct count; emission order across workers may vary.
    let mut sorted = completions;
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn abort_before_start_halts_queue_draw() {
    let orchestrator = orchestrator(3).await;
    orchestrator
        .abort_handle()
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let listener = Arc::new(CollectingListener::default());

    let results = orchestrator.run_suite(suite(4), listener.clone()).await;

    assert!(results.is_empty());
    match listener.events().last() {
        Some(ProgressEvent::ExecutionCompleted { counters }) => {
            assert_eq!(counters.completed, 0);
        }
        other => panic!("expected ExecutionCompleted, got {other:?}"),
    }
}
