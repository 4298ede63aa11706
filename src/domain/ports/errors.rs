//! Error types shared by port contracts.

use thiserror::Error;

/// Errors surfaced by persistent store adapters.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(err.to_string())
            }
            _ => Self::Query(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors surfaced by the conversational agent endpoint.
#[derive(Error, Debug)]
pub enum AgentClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Agent returned malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors surfaced by the content source/patcher.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Unknown target file: {0}")]
    UnknownTarget(String),

    #[error("Apply failed for {target}: {detail}")]
    ApplyFailed { target: String, detail: String },

    #[error("Rollback failed for {target}: {detail}")]
    RollbackFailed { target: String, detail: String },

    #[error("No pending temporary content for {0}")]
    NothingToRollback(String),
}
