//! Main configuration structure for Patter.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded hierarchically by the config loader.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Orchestrator worker pool settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Intent detector settings
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Conversation runner settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Experiment defaults
    #[serde(default)]
    pub experiment: ExperimentConfig,

    /// Agent-under-test endpoint
    #[serde(default)]
    pub agent: AgentConfig,

    /// Language-model provider settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrchestratorConfig {
    /// Concurrent workers (1-10, bounded by downstream rate limits)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

const fn default_max_workers() -> usize {
    3
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

/// Intent detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DetectorConfig {
    /// Cache entry time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Prune the cache when it grows beyond this many entries
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    /// Consecutive identical intents before a repetition issue is recorded
    #[serde(default = "default_repetition_threshold")]
    pub repetition_threshold: u32,
    /// Turns with zero fields collected before a stuck issue is recorded
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,
}

const fn default_cache_ttl_secs() -> u64 {
    300
}
const fn default_cache_max_entries() -> usize {
    500
}
const fn default_repetition_threshold() -> u32 {
    3
}
const fn default_stuck_threshold() -> u32 {
    6
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            repetition_threshold: default_repetition_threshold(),
            stuck_threshold: default_stuck_threshold(),
        }
    }
}

/// Conversation runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Hard ceiling on conversation turns
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Per-network-call timeout in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Retry a timed-out agent call once before recording an error
    #[serde(default = "default_retry_on_timeout")]
    pub retry_on_timeout: bool,
    /// Persist a progress snapshot after every turn
    #[serde(default)]
    pub persist_snapshots: bool,
    /// Abort the run when a critical constraint is violated
    #[serde(default)]
    pub abort_on_critical: bool,
}

const fn default_max_turns() -> u32 {
    25
}
const fn default_call_timeout_secs() -> u64 {
    30
}
const fn default_retry_on_timeout() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            call_timeout_secs: default_call_timeout_secs(),
            retry_on_timeout: default_retry_on_timeout(),
            persist_snapshots: false,
            abort_on_critical: false,
        }
    }
}

/// Experiment defaults applied when a drafted experiment does not override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExperimentConfig {
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,
    /// Pass-rate delta below which arms are considered equivalent
    #[serde(default = "default_practical_delta")]
    pub practical_delta: f64,
    /// Extra samples beyond minimum before declaring no meaningful difference
    #[serde(default = "default_grace_samples")]
    pub grace_samples: u32,
    #[serde(default = "default_max_sample_size")]
    pub max_sample_size: u32,
}

const fn default_significance_threshold() -> f64 {
    0.05
}
const fn default_practical_delta() -> f64 {
    0.05
}
const fn default_grace_samples() -> u32 {
    10
}
const fn default_max_sample_size() -> u32 {
    50
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            significance_threshold: default_significance_threshold(),
            practical_delta: default_practical_delta(),
            grace_samples: default_grace_samples(),
            max_sample_size: default_max_sample_size(),
        }
    }
}

/// Agent-under-test endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    #[serde(default = "default_agent_url")]
    pub base_url: String,
    /// Directory holding the agent's editable configuration files.
    /// Variant content is applied to files under this root.
    #[serde(default = "default_content_root")]
    pub content_root: String,
}

fn default_agent_url() -> String {
    "http://localhost:8080/converse".to_string()
}

fn default_content_root() -> String {
    ".".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_agent_url(),
            content_root: default_content_root(),
        }
    }
}

/// Language-model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Primary provider: "api" or "cli"
    #[serde(default = "default_llm_primary")]
    pub primary: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Path to the CLI executable for the secondary path
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_primary() -> String {
    "api".to_string()
}
fn default_llm_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}
fn default_cli_path() -> String {
    "claude".to_string()
}
const fn default_llm_timeout_secs() -> u64 {
    30
}
const fn default_llm_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            primary: default_llm_primary(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            cli_path: default_cli_path(),
            timeout_secs: default_llm_timeout_secs(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    ".patter/patter.db".to_string()
}
const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// json | pretty
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for rolling log files; stderr only when absent
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
