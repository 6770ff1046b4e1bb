use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmClient, LlmRequest, LlmResponse};
use crate::error::AgentError;

/// Deterministic [`LlmClient`] driven by a scripted queue of responses, one
/// per call to `invoke`/`invoke_stream`. Used by engine and scheduler tests
/// to exercise multi-round tool-call loops without a real provider.
pub struct MockLlm {
    responses: Mutex<Vec<LlmResponse>>,
}

impl MockLlm {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
        }
    }

    /// A mock that always returns the same fixed text with no tool calls.
    pub fn fixed(content: impl Into<String>) -> Self {
        Self::new(vec![LlmResponse {
            content: content.into(),
            tool_calls: vec![],
            usage: None,
        }])
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _request: &LlmRequest) -> Result<LlmResponse, AgentError> {
        let mut queue = self.responses.lock().expect("mock llm mutex poisoned");
        queue.pop().ok_or_else(|| {
            AgentError::Internal("MockLlm: no more scripted responses".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolChoiceMode;

    fn request() -> LlmRequest {
        LlmRequest {
            system_prompt: "you are helpful".into(),
            history: vec![],
            tool_choice: ToolChoiceMode::Auto,
        }
    }

    #[tokio::test]
    async fn returns_scripted_responses_in_order() {
        let llm = MockLlm::new(vec![
            LlmResponse {
                content: "first".into(),
                tool_calls: vec![],
                usage: None,
            },
            LlmResponse {
                content: "second".into(),
                tool_calls: vec![],
                usage: None,
            },
        ]);
        assert_eq!(llm.invoke(&request()).await.unwrap().content, "first");
        assert_eq!(llm.invoke(&request()).await.unwrap().content, "second");
        assert!(llm.invoke(&request()).await.is_err());
    }

    #[tokio::test]
    async fn fixed_repeats_forever_is_false_but_returns_once() {
        let llm = MockLlm::fixed("hi");
        assert_eq!(llm.invoke(&request()).await.unwrap().content, "hi");
    }
}
