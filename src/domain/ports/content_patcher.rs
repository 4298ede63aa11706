//! Port for the content source/patcher collaborator.
//!
//! Variant testing temporarily swaps an agent configuration file's content
//! and must restore it on every exit path. The merging/validation logic
//! behind these calls is out of scope for the harness.

use async_trait::async_trait;

use super::errors::PatchError;

/// Stored content plus its version marker.
#[derive(Debug, Clone)]
pub struct ContentVersion {
    pub content: String,
    pub version: u64,
}

/// Content source/patcher contract.
#[async_trait]
pub trait ContentPatcher: Send + Sync {
    /// Current content of a target file.
    async fn get_content(&self, target_file: &str) -> Result<ContentVersion, PatchError>;

    /// Apply replacement content for the duration of one run.
    async fn apply_temporary(&self, target_file: &str, content: &str) -> Result<(), PatchError>;

    /// Restore the pre-apply content.
    async fn rollback(&self, target_file: &str) -> Result<(), PatchError>;
}
