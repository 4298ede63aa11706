//! Language-model provider adapters.
//!
//! Two concrete providers (HTTP API and local CLI) plus a sticky
//! primary/secondary fallback wrapper. A factory builds the stack the
//! configuration asks for.

pub mod api;
pub mod cli;
pub mod fallback;

use std::sync::Arc;

use crate::domain::models::LlmConfig;
use crate::domain::ports::LlmProvider;

pub use api::ApiProvider;
pub use cli::CliProvider;
pub use fallback::FallbackProvider;

/// Build the provider stack from configuration: the configured primary
/// first, the other path as fallback.
pub fn build_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    let api: Arc<dyn LlmProvider> = Arc::new(ApiProvider::new(config));
    let cli: Arc<dyn LlmProvider> = Arc::new(CliProvider::new(config));
    match config.primary.as_str() {
        "cli" => Arc::new(FallbackProvider::new(cli, api)),
        _ => Arc::new(FallbackProvider::new(api, cli)),
    }
}
