//! Conversation transcript types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The agent under test
    Agent,
    /// The simulated caller
    Caller,
}

/// One utterance in a conversation run. Transcripts are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time the remote side took to produce this turn, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl ConversationTurn {
    pub fn agent(content: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            role: TurnRole::Agent,
            content: content.into(),
            timestamp: Utc::now(),
            response_time_ms: Some(response_time_ms),
        }
    }

    pub fn caller(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Caller,
            content: content.into(),
            timestamp: Utc::now(),
            response_time_ms: None,
        }
    }
}

/// Render the last `n` turns as "Agent: ..." / "Caller: ..." lines for
/// inclusion in a detection prompt.
pub fn recent_history(transcript: &[ConversationTurn], n: usize) -> String {
    let start = transcript.len().saturating_sub(n);
    transcript[start..]
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                TurnRole::Agent => "Agent",
                TurnRole::Caller => "Caller",
            };
            format!("{speaker}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_history_takes_tail() {
        let transcript = vec![
            ConversationTurn::agent("one", 10),
            ConversationTurn::caller("two"),
            ConversationTurn::agent("three", 12),
        ];
        let rendered = recent_history(&transcript, 2);
        assert_eq!(rendered, "Caller: two\nAgent: three");
    }

    #[test]
    fn recent_history_handles_short_transcripts() {
        let transcript = vec![ConversationTurn::caller("hi")];
        assert_eq!(recent_history(&transcript, 4), "Caller: hi");
        assert_eq!(recent_history(&[], 4), "");
    }
}
