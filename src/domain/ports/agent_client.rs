//! Port for the conversational agent under test.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::AgentClientError;

/// One reply from the agent under test.
///
/// `tool_calls` is opaque metadata: the harness logs it but never
/// interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<serde_json::Value>,
}

/// Client for the remote agent endpoint.
///
/// The endpoint maintains per-session state, so a session id must never be
/// shared between concurrent workers.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Send one caller message within a session and return the agent reply.
    async fn send(&self, message: &str, session_id: &str) -> Result<AgentReply, AgentClientError>;
}
