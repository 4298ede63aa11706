//! End-to-end conversation runs against scripted agent doubles.

mod common;

use std::sync::Arc;

use common::{
    booking_goal, case_with_goals, data_goal, quick_runner_config, run_id, runner_harness,
    ConstantAgent, FailingAgent, ScriptedAgent,
};
use patter::domain::models::{FieldKey, TestStatus, Variant, VariantType};
use patter::domain::ports::{ContentPatcher, RunStore};
use patter::infrastructure::content::FileContentPatcher;

#[tokio::test]
async fn data_collection_run_passes_end_to_end() {
    let agent = Arc::new(ScriptedAgent::new(&[
        "Thanks for calling! May I ask your name?",
        "Great. What is your child's date of birth?",
    ]));
    let harness = runner_harness(agent, quick_runner_config()).await;
    let case = case_with_goals(
        "collect-basics",
        vec![data_goal(
            "basics",
            vec![FieldKey::ParentName, FieldKey::ChildDob],
        )],
    );

    let id = run_id();
    let result = harness.runner.run(&case, "itest-session", id).await;

    assert!(result.passed, "stop_reason was {}", result.stop_reason);
    assert_eq!(result.status, TestStatus::Completed);
    assert_eq!(result.stop_reason, "goals-satisfied");
    assert_eq!(result.turn_count, 2);

    let goal = &result.goal_results[0];
    assert!(goal.achieved);
    assert!(goal.collected.contains(&FieldKey::ParentName));
    assert!(goal.collected.contains(&FieldKey::ChildDob));
    assert!(goal.missing.is_empty());

    // The result is persisted under (run_id, test_id).
    let stored = harness
        .store
        .get_result(id, "collect-basics")
        .await
        .unwrap()
        .expect("persisted result");
    assert!(stored.passed);
    assert_eq!(stored.turn_count, 2);
}

#[tokio::test]
async fn terminal_booking_intent_stops_the_run() {
    let agent = Arc::new(ScriptedAgent::new(&[
        "May I ask your name?",
        "You're all booked for Tuesday. Anything else?",
    ]));
    let harness = runner_harness(agent, quick_runner_config()).await;
    let case = case_with_goals(
        "book-visit",
        vec![
            data_goal("name", vec![FieldKey::ParentName]),
            booking_goal("booked"),
        ],
    );

    let result = harness.runner.run(&case, "itest-session", run_id()).await;

    assert!(result.passed);
    assert_eq!(result.stop_reason, "terminal-intent:confirming_booking");
    assert!(result.goal_results.iter().all(|g| g.achieved));
}

#[tokio::test]
async fn turn_ceiling_fails_the_run() {
    let agent = Arc::new(ConstantAgent(
        "Hello! How can I help you today?".to_string(),
    ));
    let mut config = quick_runner_config();
    config.max_turns = 3;
    let harness = runner_harness(agent, config).await;
    let case = case_with_goals("never-asked", vec![data_goal("name", vec![FieldKey::ParentName])]);

    let result = harness.runner.run(&case, "itest-session", run_id()).await;

    assert!(!result.passed);
    assert_eq!(result.status, TestStatus::Completed);
    assert_eq!(result.stop_reason, "max-turns-reached");
    assert_eq!(result.turn_count, 3);
    let goal = &result.goal_results[0];
    assert!(!goal.achieved);
    assert_eq!(goal.missing, vec![FieldKey::ParentName]);
}

#[tokio::test]
async fn transport_failure_yields_persisted_error_result() {
    let agent = Arc::new(FailingAgent::default());
    let harness = runner_harness(agent, quick_runner_config()).await;
    let case = case_with_goals("unreachable", vec![booking_goal("booked")]);

    let id = run_id();
    let result = harness.runner.run(&case, "itest-session", id).await;

    assert!(!result.passed);
    assert_eq!(result.status, TestStatus::Error);
    assert!(result
        .error_message
        .as_deref()
        .unwrap()
        .contains("connection refused"));

    let stored = harness
        .store
        .get_result(id, "unreachable")
        .await
        .unwrap()
        .expect("error results are persisted too");
    assert_eq!(stored.status, TestStatus::Error);
}

#[tokio::test]
async fn failed_agent_call_is_retried_once_when_configured() {
    let agent = Arc::new(FailingAgent::default());
    let mut config = quick_runner_config();
    config.retry_on_timeout = true;
    let harness = runner_harness(agent.clone(), config).await;
    let case = case_with_goals("retry-me", vec![booking_goal("booked")]);

    let result = harness.runner.run(&case, "itest-session", run_id()).await;

    assert_eq!(result.status, TestStatus::Error);
    // One initial attempt plus exactly one retry for the opening message.
    assert_eq!(agent.calls(), 2);
}

#[tokio::test]
async fn variant_lease_restores_target_content_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let prompts = dir.path().join("prompts");
    std::fs::create_dir_all(&prompts).unwrap();
    std::fs::write(prompts.join("greeting.md"), "baseline greeting").unwrap();

    let patcher: Arc<dyn ContentPatcher> = Arc::new(FileContentPatcher::new(dir.path()));
    let variant = Variant::new(
        VariantType::Prompt,
        "prompts/greeting.md",
        "candidate greeting",
    );

    let agent = Arc::new(ConstantAgent::booking());
    let harness = runner_harness(agent, quick_runner_config()).await;
    let case = case_with_goals("variant-run", vec![booking_goal("booked")]);

    let result = harness
        .runner
        .run_with_variant(&case, "itest-session", run_id(), &variant, patcher)
        .await;

    assert!(result.passed);
    let restored = std::fs::read_to_string(prompts.join("greeting.md")).unwrap();
    assert_eq!(restored, "baseline greeting");
}

#[tokio::test]
async fn variant_lease_rolls_back_after_mid_run_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.yaml"), "retries: 1").unwrap();

    let patcher: Arc<dyn ContentPatcher> = Arc::new(FileContentPatcher::new(dir.path()));
    let variant = Variant::new(VariantType::Config, "config.yaml", "retries: 3");

    let agent = Arc::new(FailingAgent::default());
    let harness = runner_harness(agent, quick_runner_config()).await;
    let case = case_with_goals("variant-error", vec![booking_goal("booked")]);

    let result = harness
        .runner
        .run_with_variant(&case, "itest-session", run_id(), &variant, patcher)
        .await;

    assert_eq!(result.status, TestStatus::Error);
    let restored = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert_eq!(restored, "retries: 1");
}
