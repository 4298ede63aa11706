//! HTTP API provider.
//!
//! Talks to an Anthropic-compatible messages endpoint via reqwest. The
//! API key is read from the environment variable named in configuration,
//! never stored in config files.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::LlmConfig;
use crate::domain::ports::{LlmProvider, LlmRequest, LlmResponse, LlmUsage};

pub struct ApiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key_env: String,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Vec<ApiContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl ApiProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key_env: config.api_key_env.clone(),
        }
    }

    fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

#[async_trait]
impl LlmProvider for ApiProvider {
    async fn complete(&self, request: LlmRequest) -> LlmResponse {
        let started = Instant::now();
        let Some(api_key) = self.api_key() else {
            return LlmResponse::failure(
                format!("API key environment variable {} not set", self.api_key_env),
                0,
            );
        };

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(system) = &request.system_prompt {
            body["system"] = json!(system);
        }

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .timeout(Duration::from_secs(request.timeout_secs))
            .json(&body)
            .send()
            .await;

        let elapsed = started.elapsed().as_millis() as u64;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "API request failed");
                return LlmResponse::failure(format!("request failed: {e}"), elapsed);
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return LlmResponse::failure(format!("API error {status}: {detail}"), elapsed);
        }

        let message: ApiMessage = match response.json().await {
            Ok(m) => m,
            Err(e) => {
                return LlmResponse::failure(format!("malformed API response: {e}"), elapsed)
            }
        };

        let content = message
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        debug!(duration_ms = elapsed, "API completion succeeded");

        LlmResponse {
            success: true,
            content: Some(content),
            error: None,
            usage: message.usage.map(|u| LlmUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
            duration_ms: elapsed,
        }
    }

    async fn is_available(&self) -> bool {
        self.api_key().is_some()
    }
}
