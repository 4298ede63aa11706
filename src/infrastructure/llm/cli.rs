//! CLI provider.
//!
//! Shells out to a locally installed model CLI. Used as the secondary
//! path when the API is unreachable or unconfigured; the CLI carries its
//! own authentication, so nothing is read from the environment here.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::domain::models::LlmConfig;
use crate::domain::ports::{LlmProvider, LlmRequest, LlmResponse};

pub struct CliProvider {
    cli_path: String,
}

impl CliProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            cli_path: config.cli_path.clone(),
        }
    }

    async fn run_cli(&self, request: &LlmRequest) -> Result<String, String> {
        let mut cmd = Command::new(&self.cli_path);
        cmd.arg("-p")
            .arg("--model")
            .arg(&request.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(system) = &request.system_prompt {
            cmd.arg("--append-system-prompt").arg(system);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {e}", self.cli_path))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "failed to open CLI stdin".to_string())?;
        stdin
            .write_all(request.prompt.as_bytes())
            .await
            .map_err(|e| format!("failed to write prompt: {e}"))?;
        drop(stdin);

        let output = timeout(
            Duration::from_secs(request.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| format!("CLI timed out after {}s", request.timeout_secs))?
        .map_err(|e| format!("CLI execution failed: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("CLI exited with {}: {stderr}", output.status));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl LlmProvider for CliProvider {
    async fn complete(&self, request: LlmRequest) -> LlmResponse {
        let started = Instant::now();
        match self.run_cli(&request).await {
            Ok(content) => {
                let elapsed = started.elapsed().as_millis() as u64;
                debug!(duration_ms = elapsed, "CLI completion succeeded");
                LlmResponse {
                    success: true,
                    content: Some(content),
                    error: None,
                    usage: None,
                    duration_ms: elapsed,
                }
            }
            Err(error) => {
                warn!(%error, "CLI completion failed");
                LlmResponse::failure(error, started.elapsed().as_millis() as u64)
            }
        }
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.cli_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}
