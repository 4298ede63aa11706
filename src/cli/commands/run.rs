//! Suite execution command.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput, ConsoleProgressListener, TableFormatter};
use crate::domain::models::{Config, GoalTestCase, GoalTestResult};
use crate::infrastructure::agent::HttpAgentClient;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::content::FileContentPatcher;
use crate::infrastructure::database::{DatabaseConnection, SqliteExperimentStore, SqliteRunStore};
use crate::infrastructure::llm::build_provider;
use crate::services::{
    ExperimentRunner, ExperimentService, GoalTestRunner, IntentDetector, ProgressTracker,
    TestOrchestrator,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the test suite YAML file
    pub suite: String,

    /// Path to a config file (defaults to hierarchical .patter/ loading)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Run only the test cases with these ids (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Record runs as samples of this running experiment, applying the
    /// selected arm's content for each run
    #[arg(short, long)]
    pub experiment: Option<Uuid>,
}

/// On-disk shape of a suite file.
#[derive(Debug, Deserialize)]
struct SuiteFile {
    tests: Vec<GoalTestCase>,
}

#[derive(Debug, Serialize)]
struct RunOutput {
    total: usize,
    passed: usize,
    failed: usize,
    errored: usize,
    results: Vec<GoalTestResult>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let table = TableFormatter::new().format_results(&self.results);
        format!(
            "{table}\n{} of {} passed ({} errored)",
            self.passed, self.total, self.errored
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, json: bool) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    let raw = std::fs::read_to_string(&args.suite)
        .with_context(|| format!("failed to read suite file {}", args.suite))?;
    let suite: SuiteFile = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse suite file {}", args.suite))?;

    let tests: Vec<GoalTestCase> = if args.only.is_empty() {
        suite.tests
    } else {
        suite
            .tests
            .into_iter()
            .filter(|t| args.only.contains(&t.id))
            .collect()
    };
    anyhow::ensure!(!tests.is_empty(), "no test cases selected");

    let listener = Arc::new(ConsoleProgressListener::new(json));
    let results = match args.experiment {
        Some(experiment_id) => {
            let (runner, conn) = build_runner(&config).await?;
            let store = Arc::new(SqliteExperimentStore::new(conn.pool()));
            let service = Arc::new(ExperimentService::new(store, config.experiment.clone()));
            let patcher = Arc::new(FileContentPatcher::new(config.agent.content_root.clone()));
            ExperimentRunner::new(runner, service, patcher)
                .run_suite(experiment_id, tests, listener)
                .await?
        }
        None => {
            let (runner, _conn) = build_runner(&config).await?;
            TestOrchestrator::new(runner, config.orchestrator.clone())
                .run_suite(tests, listener)
                .await
        }
    };

    let passed = results.iter().filter(|r| r.passed).count();
    let errored = results
        .iter()
        .filter(|r| r.status == crate::domain::models::TestStatus::Error)
        .count();
    let summary = RunOutput {
        total: results.len(),
        passed,
        failed: results.len() - passed,
        errored,
        results,
    };
    output(&summary, json);

    anyhow::ensure!(summary.failed == 0, "{} test(s) failed", summary.failed);
    Ok(())
}

pub(crate) fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

async fn build_runner(config: &Config) -> Result<(Arc<GoalTestRunner>, DatabaseConnection)> {
    let conn = DatabaseConnection::new(&config.database).await?;
    let run_store = Arc::new(SqliteRunStore::new(conn.pool()));

    let provider = build_provider(&config.llm);
    let detector = Arc::new(IntentDetector::new(
        provider,
        config.llm.clone(),
        &config.detector,
    ));
    let tracker = Arc::new(ProgressTracker::new(&config.detector));
    let agent = Arc::new(HttpAgentClient::new(&config.agent));

    let runner = Arc::new(GoalTestRunner::new(
        agent,
        detector,
        tracker,
        run_store,
        config.runner.clone(),
    ));
    Ok((runner, conn))
}
