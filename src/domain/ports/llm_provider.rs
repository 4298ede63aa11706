//! Port for the language-model provider used by intent detection.
//!
//! The harness never assumes a specific provider. It only requires this
//! request/response contract and a binary availability check.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Token usage reported by the provider, when available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Provider response. `success == false` carries `error` instead of
/// `content`; the caller decides whether to fall back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
    pub duration_ms: u64,
}

impl LlmResponse {
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
            usage: None,
            duration_ms,
        }
    }
}

/// Language-model provider contract.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute one completion. Failures are reported in the response, not
    /// as transport errors, so callers can fall back uniformly.
    async fn complete(&self, request: LlmRequest) -> LlmResponse;

    /// Cheap availability probe.
    async fn is_available(&self) -> bool;
}
