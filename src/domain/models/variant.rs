//! Configuration variants under experiment.
//!
//! A variant is an immutable, content-addressed alternative version of one
//! agent configuration file. Identical content for the same target file is
//! never stored twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// What kind of configuration a variant alters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    /// System prompt or conversational instruction content
    Prompt,
    /// Tool definition content
    Tool,
    /// Parameter/settings content
    Config,
}

impl VariantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Tool => "tool",
            Self::Config => "config",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "prompt" => Some(Self::Prompt),
            "tool" => Some(Self::Tool),
            "config" => Some(Self::Config),
            _ => None,
        }
    }
}

/// One immutable configuration variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub variant_id: Uuid,
    pub variant_type: VariantType,
    /// Logical identity of the file the content replaces
    pub target_file: String,
    pub content: String,
    /// Hex SHA-256 of `content`; dedup key together with `target_file`
    pub content_hash: String,
    pub is_baseline: bool,
    /// The baseline this variant was derived from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_variant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Variant {
    pub fn new(
        variant_type: VariantType,
        target_file: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            variant_id: Uuid::new_v4(),
            variant_type,
            target_file: target_file.into(),
            content_hash: Self::hash_content(&content),
            content,
            is_baseline: false,
            baseline_variant_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }
}
