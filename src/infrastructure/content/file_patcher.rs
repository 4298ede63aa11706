//! Filesystem content patcher.
//!
//! Applies variant content to agent configuration files under a root
//! directory and restores the original content on rollback. Pre-apply
//! content is held in memory per target, so at most one temporary apply
//! may be outstanding per file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::ports::{ContentPatcher, ContentVersion, PatchError};

struct Saved {
    original: String,
    version: u64,
}

pub struct FileContentPatcher {
    root: PathBuf,
    pending: Mutex<HashMap<String, Saved>>,
    versions: Mutex<HashMap<String, u64>>,
}

impl FileContentPatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pending: Mutex::new(HashMap::new()),
            versions: Mutex::new(HashMap::new()),
        }
    }

    fn resolve(&self, target_file: &str) -> Result<PathBuf, PatchError> {
        // Reject traversal: targets are logical names under the root.
        if target_file.contains("..") || Path::new(target_file).is_absolute() {
            return Err(PatchError::UnknownTarget(target_file.to_string()));
        }
        Ok(self.root.join(target_file))
    }

    async fn read(&self, target_file: &str) -> Result<String, PatchError> {
        let path = self.resolve(target_file)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| PatchError::UnknownTarget(target_file.to_string()))
    }
}

#[async_trait]
impl ContentPatcher for FileContentPatcher {
    async fn get_content(&self, target_file: &str) -> Result<ContentVersion, PatchError> {
        let content = self.read(target_file).await?;
        let version = *self
            .versions
            .lock()
            .await
            .entry(target_file.to_string())
            .or_insert(0);
        Ok(ContentVersion { content, version })
    }

    async fn apply_temporary(&self, target_file: &str, content: &str) -> Result<(), PatchError> {
        let mut pending = self.pending.lock().await;
        if pending.contains_key(target_file) {
            return Err(PatchError::ApplyFailed {
                target: target_file.to_string(),
                detail: "a temporary apply is already outstanding".to_string(),
            });
        }

        let original = self.read(target_file).await?;
        let path = self.resolve(target_file)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| PatchError::ApplyFailed {
                target: target_file.to_string(),
                detail: e.to_string(),
            })?;

        let mut versions = self.versions.lock().await;
        let version = versions.entry(target_file.to_string()).or_insert(0);
        *version += 1;
        pending.insert(
            target_file.to_string(),
            Saved {
                original,
                version: *version,
            },
        );
        debug!(target_file, version = *version, "temporary content applied");
        Ok(())
    }

    async fn rollback(&self, target_file: &str) -> Result<(), PatchError> {
        let mut pending = self.pending.lock().await;
        let saved = pending
            .remove(target_file)
            .ok_or_else(|| PatchError::NothingToRollback(target_file.to_string()))?;

        let path = self.resolve(target_file)?;
        if let Err(e) = tokio::fs::write(&path, &saved.original).await {
            // Keep the saved content so a retry can still restore.
            pending.insert(target_file.to_string(), saved);
            return Err(PatchError::RollbackFailed {
                target: target_file.to_string(),
                detail: e.to_string(),
            });
        }
        info!(target_file, version = saved.version, "content rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn patcher_with_file(content: &str) -> (TempDir, FileContentPatcher) {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("prompt.md"), content)
            .await
            .unwrap();
        let patcher = FileContentPatcher::new(dir.path());
        (dir, patcher)
    }

    #[tokio::test]
    async fn apply_and_rollback_restore_original() {
        let (dir, patcher) = patcher_with_file("original").await;

        patcher.apply_temporary("prompt.md", "variant").await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("prompt.md"))
                .await
                .unwrap(),
            "variant"
        );

        patcher.rollback("prompt.md").await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("prompt.md"))
                .await
                .unwrap(),
            "original"
        );
    }

    #[tokio::test]
    async fn double_apply_is_rejected() {
        let (_dir, patcher) = patcher_with_file("original").await;
        patcher.apply_temporary("prompt.md", "one").await.unwrap();
        let err = patcher.apply_temporary("prompt.md", "two").await.unwrap_err();
        assert!(matches!(err, PatchError::ApplyFailed { .. }));
    }

    #[tokio::test]
    async fn rollback_without_apply_fails() {
        let (_dir, patcher) = patcher_with_file("original").await;
        let err = patcher.rollback("prompt.md").await.unwrap_err();
        assert!(matches!(err, PatchError::NothingToRollback(_)));
    }

    #[tokio::test]
    async fn traversal_targets_are_unknown() {
        let (_dir, patcher) = patcher_with_file("original").await;
        let err = patcher.get_content("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, PatchError::UnknownTarget(_)));
    }

    #[tokio::test]
    async fn version_increments_per_apply() {
        let (_dir, patcher) = patcher_with_file("original").await;
        assert_eq!(patcher.get_content("prompt.md").await.unwrap().version, 0);

        patcher.apply_temporary("prompt.md", "v1").await.unwrap();
        patcher.rollback("prompt.md").await.unwrap();
        patcher.apply_temporary("prompt.md", "v2").await.unwrap();
        patcher.rollback("prompt.md").await.unwrap();

        assert_eq!(patcher.get_content("prompt.md").await.unwrap().version, 2);
    }
}
