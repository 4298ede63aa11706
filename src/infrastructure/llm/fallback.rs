//! Primary/secondary provider fallback.
//!
//! Routes completions to the primary provider and falls back to the
//! secondary on failure. Once the primary fails, the switch is sticky for
//! the rest of the process so a dead endpoint is not re-probed on every
//! detection call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::ports::{LlmProvider, LlmRequest, LlmResponse};

pub struct FallbackProvider {
    primary: Arc<dyn LlmProvider>,
    secondary: Arc<dyn LlmProvider>,
    primary_down: AtomicBool,
}

impl FallbackProvider {
    pub fn new(primary: Arc<dyn LlmProvider>, secondary: Arc<dyn LlmProvider>) -> Self {
        Self {
            primary,
            secondary,
            primary_down: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LlmProvider for FallbackProvider {
    async fn complete(&self, request: LlmRequest) -> LlmResponse {
        if !self.primary_down.load(Ordering::Relaxed) {
            let response = self.primary.complete(request.clone()).await;
            if response.success {
                return response;
            }
            warn!(
                error = response.error.as_deref().unwrap_or("unknown"),
                "primary provider failed, switching to secondary for this process"
            );
            self.primary_down.store(true, Ordering::Relaxed);
        }

        let response = self.secondary.complete(request).await;
        if response.success {
            info!("secondary provider served the completion");
        }
        response
    }

    async fn is_available(&self) -> bool {
        if !self.primary_down.load(Ordering::Relaxed) && self.primary.is_available().await {
            return true;
        }
        self.secondary.is_available().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct ScriptedProvider {
        succeed: bool,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                succeed,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, _request: LlmRequest) -> LlmResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                LlmResponse {
                    success: true,
                    content: Some("ok".to_string()),
                    error: None,
                    usage: None,
                    duration_ms: 1,
                }
            } else {
                LlmResponse::failure("scripted failure", 1)
            }
        }

        async fn is_available(&self) -> bool {
            self.succeed
        }
    }

    fn request() -> LlmRequest {
        LlmRequest {
            prompt: "p".to_string(),
            system_prompt: None,
            model: "m".to_string(),
            max_tokens: 16,
            temperature: 0.0,
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn primary_serves_when_healthy() {
        let primary = ScriptedProvider::new(true);
        let secondary = ScriptedProvider::new(true);
        let fallback = FallbackProvider::new(primary.clone(), secondary.clone());

        assert!(fallback.complete(request()).await.success);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_primary_is_not_reprobed() {
        let primary = ScriptedProvider::new(false);
        let secondary = ScriptedProvider::new(true);
        let fallback = FallbackProvider::new(primary.clone(), secondary.clone());

        assert!(fallback.complete(request()).await.success);
        assert!(fallback.complete(request()).await.success);
        assert!(fallback.complete(request()).await.success);

        // The primary was tried exactly once; the sticky switch covers the rest.
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn both_failing_reports_secondary_error() {
        let fallback =
            FallbackProvider::new(ScriptedProvider::new(false), ScriptedProvider::new(false));
        let response = fallback.complete(request()).await;
        assert!(!response.success);
        assert!(!fallback.is_available().await);
    }
}
