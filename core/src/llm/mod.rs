//! LLM Provider (port): `stream(request) → async sequence of {token|error|done}`
//! with cancellation via a [`CancellationToken`], and an optional native
//! tool-call channel (spec.md §2). Concrete per-provider adapters are
//! explicitly out of scope (spec.md §1 Non-goals) — this module defines only
//! the trait and [`MockLlm`], a deterministic stand-in used by the engine's
//! own tests and by any embedding application that hasn't wired a real
//! adapter yet.

mod mock;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use mock::MockLlm;

use crate::domain::{ConversationTurn, ToolCall};
use crate::error::AgentError;
use crate::stream::MessageChunk;

/// Tool choice mode for chat completions: when tools are present, controls
/// whether the model may choose (auto), must not use (none), or must use
/// (required).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

impl std::str::FromStr for ToolChoiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "none" => Ok(Self::None),
            "required" => Ok(Self::Required),
            _ => Err(format!(
                "unknown tool_choice: {s} (use auto, none, or required)"
            )),
        }
    }
}

/// Token usage for one LLM call (prompt + completion); threaded through
/// conversation-turn metadata so `BudgetExceeded` (spec.md §7) can compare a
/// running total against the user's monthly limit.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from one provider invocation: assistant text plus any native
/// tool calls.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<LlmUsage>,
}

/// One provider request: full conversation context plus tool-calling mode.
#[derive(Clone, Debug)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub history: Vec<ConversationTurn>,
    pub tool_choice: ToolChoiceMode,
}

/// LLM Provider port (spec.md §2). `invoke_stream` is the primary entry
/// point used by [`crate::engine`]: it streams tokens to `chunk_tx` as they
/// arrive and returns the accumulated response (with any native tool calls)
/// once the provider signals completion. `cancel` is observed at every
/// suspension point inside the stream; a cancelled token ends the call with
/// [`AgentError::Cancelled`] rather than a partial success.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, AgentError>;

    /// Streaming variant. Default implementation calls `invoke` and forwards
    /// the full content as a single chunk — adapters that support true
    /// token-level streaming override this.
    async fn invoke_stream(
        &self,
        request: &LlmRequest,
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
        cancel: CancellationToken,
    ) -> Result<LlmResponse, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let response = self.invoke(request).await?;
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                let _ = tx
                    .send(MessageChunk {
                        content: response.content.clone(),
                    })
                    .await;
            }
        }
        Ok(response)
    }
}
