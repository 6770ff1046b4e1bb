//! `send_telegram_message` — the model's bridge onto the
//! [`crate::transport::MessageTransport`] port. Named for the concrete
//! transport spec.md §6 describes (a Telegram-shaped bot API); a different
//! transport implementation would register a differently-named tool against
//! the same port.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ToolDefinition;
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};
use crate::transport::{MessageTransport, OutboundMessage};

pub struct SendTelegramMessage {
    pub transport: std::sync::Arc<dyn MessageTransport>,
    pub chat_id: String,
}

impl SendTelegramMessage {
    pub fn new(transport: std::sync::Arc<dyn MessageTransport>, chat_id: impl Into<String>) -> Self {
        Self {
            transport,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Tool for SendTelegramMessage {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "send_telegram_message",
            "Sends a text message to the agent's configured Telegram chat.",
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        )
    }

    async fn call(&self, params: Value, _ctx: &ToolCallContext) -> Result<Value, AgentError> {
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing text".into()))?;

        self.transport
            .send_message(&OutboundMessage::text(self.chat_id.clone(), text))
            .await?;
        Ok(json!({"sent": true}))
    }
}
