//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the async trait interfaces infrastructure adapters
//! must implement:
//! - `AgentClient`: the conversational agent endpoint under test
//! - `LlmProvider`: the language model used for intent detection
//! - `ContentPatcher`: temporary variant application and rollback
//! - `RunStore` / `ExperimentStore`: persistence contracts
//! - `ProgressListener`: live progress observation
//!
//! These traits keep the core simulator and experiment logic independent
//! of specific infrastructure.

pub mod agent_client;
pub mod content_patcher;
pub mod errors;
pub mod experiment_store;
pub mod llm_provider;
pub mod progress_listener;
pub mod run_store;

pub use agent_client::{AgentClient, AgentReply};
pub use content_patcher::{ContentPatcher, ContentVersion};
pub use errors::{AgentClientError, PatchError, StoreError};
pub use experiment_store::ExperimentStore;
pub use llm_provider::{LlmProvider, LlmRequest, LlmResponse, LlmUsage};
pub use progress_listener::{
    NullListener, ProgressCounters, ProgressEvent, ProgressListener, WorkerState,
};
pub use run_store::RunStore;
