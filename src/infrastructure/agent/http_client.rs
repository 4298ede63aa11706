//! HTTP client for the agent under test.
//!
//! Posts `{message, session_id}` to the configured endpoint and expects a
//! JSON reply with the agent text and optional tool-call metadata.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::models::AgentConfig;
use crate::domain::ports::{AgentClient, AgentClientError, AgentReply};

pub struct HttpAgentClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct WireReply {
    text: String,
    #[serde(default)]
    tool_calls: Vec<serde_json::Value>,
}

impl HttpAgentClient {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn send(&self, message: &str, session_id: &str) -> Result<AgentReply, AgentClientError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&json!({
                "message": message,
                "session_id": session_id,
            }))
            .send()
            .await
            .map_err(|e| AgentClientError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentClientError::Transport(format!(
                "agent returned {}",
                response.status()
            )));
        }

        let reply: WireReply = response
            .json()
            .await
            .map_err(|e| AgentClientError::MalformedResponse(e.to_string()))?;

        debug!(session_id, chars = reply.text.len(), "agent reply received");
        Ok(AgentReply {
            text: reply.text,
            tool_calls: reply.tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: String) -> HttpAgentClient {
        HttpAgentClient::new(&AgentConfig {
            base_url: url,
            ..AgentConfig::default()
        })
    }

    #[tokio::test]
    async fn sends_session_scoped_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({
                "message": "Hi, I need an appointment",
                "session_id": "w0-abc",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"Of course! May I have your name?","tool_calls":[]}"#)
            .create_async()
            .await;

        let reply = client(server.url())
            .send("Hi, I need an appointment", "w0-abc")
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(reply.text.contains("your name"));
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn tool_calls_default_when_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"Done."}"#)
            .create_async()
            .await;

        let reply = client(server.url()).send("thanks", "s1").await.unwrap();
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn http_error_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/").with_status(503).create_async().await;

        let err = client(server.url()).send("hello", "s1").await.unwrap_err();
        assert!(matches!(err, AgentClientError::Transport(_)));
    }

    #[tokio::test]
    async fn bad_json_is_malformed_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(server.url()).send("hello", "s1").await.unwrap_err();
        assert!(matches!(err, AgentClientError::MalformedResponse(_)));
    }
}
