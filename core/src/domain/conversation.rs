use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// `{role, content, toolCalls?, toolResults?, timestamp}`. Ordered sequence
/// per agent session.
///
/// Invariant: every `toolCall` emitted by the model is followed, in a later
/// turn of the same session, by a matching `toolResult` sharing its
/// `correlationId` before the next assistant turn is requested — enforced by
/// [`crate::engine::run_turn`], which always appends the full result batch
/// before re-invoking the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_results: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Tool,
            content: String::new(),
            tool_calls: Vec::new(),
            tool_results: results,
            timestamp: chrono::Utc::now(),
        }
    }

    /// True if every `toolCall` in this turn has a matching `toolResult` by
    /// `correlationId` somewhere in `history` (including this turn itself).
    pub fn tool_calls_satisfied(&self, history: &[ConversationTurn]) -> bool {
        self.tool_calls.iter().all(|call| {
            history
                .iter()
                .flat_map(|t| t.tool_results.iter())
                .any(|r| r.correlation_id == call.correlation_id)
        })
    }
}
