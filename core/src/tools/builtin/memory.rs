//! `remember` / `recall` / `list_memories` — working memory, a small labeled
//! key/value scratchpad distinct from notes (spec.md §3 `WorkingMemoryEntry`:
//! labels unique per agent, a second write to the same label overwrites).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{ToolDefinition, WorkingMemoryEntry};
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};

pub struct Remember;

#[async_trait]
impl Tool for Remember {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "remember",
            "Stores a labeled fact in working memory, overwriting any prior value under the same label.",
            json!({
                "type": "object",
                "properties": {
                    "label": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["label", "content"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        let label = params
            .get("label")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing label".into()))?;
        let content = params
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing content".into()))?;

        let entry = WorkingMemoryEntry::new(label, content);
        let ns = ctx.namespace("workingMemory");
        ctx.store()?
            .put(&ns, label, &json!(entry))
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(json!({"label": label}))
    }
}

pub struct Recall;

#[async_trait]
impl Tool for Recall {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::read_only(
            "recall",
            "Retrieves the working-memory entry stored under a label.",
            json!({
                "type": "object",
                "properties": {"label": {"type": "string"}},
                "required": ["label"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        let label = params
            .get("label")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing label".into()))?;

        let ns = ctx.namespace("workingMemory");
        let entry = ctx
            .store()?
            .get(&ns, label)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?
            .ok_or_else(|| AgentError::NotFound(format!("working memory label {label}")))?;
        Ok(entry)
    }
}

pub struct ListMemories;

#[async_trait]
impl Tool for ListMemories {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::read_only(
            "list_memories",
            "Lists all working-memory labels currently stored for this agent.",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn call(&self, _params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        let ns = ctx.namespace("workingMemory");
        let labels = ctx
            .store()?
            .list(&ns)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(json!(labels))
    }
}
