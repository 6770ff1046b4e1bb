use serde::{Deserialize, Serialize};

use crate::llm::LlmUsage;

/// `{id, agentId, provider, model, promptTokens, completionTokens,
/// totalTokens, occurredAt}`. Append-only (spec.md §6 `user_usage_events`);
/// one entry per completed `run_turn` call, written regardless of whether
/// the turn used any tools, so the event stream reflects every provider
/// round-trip a turn actually made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub agent_id: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl UsageEvent {
    pub fn new(agent_id: impl Into<String>, provider: impl Into<String>, model: impl Into<String>, usage: &LlmUsage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            provider: provider.into(),
            model: model.into(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            occurred_at: chrono::Utc::now(),
        }
    }
}
