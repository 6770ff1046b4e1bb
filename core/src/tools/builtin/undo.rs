//! `undo_last` — pops the most recent [`crate::domain::UndoEntry`] off the
//! agent's undo stack and re-dispatches its recorded inverse action through
//! the same registry (spec.md §8 round-trip law: `create_note` followed by
//! its recorded inverse leaves the note store equal to its prior state).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{ToolDefinition, UndoEntry};
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};

/// Appends an [`UndoEntry`] to the agent's undo stack, bounded at
/// `max_len` entries (oldest dropped past the bound), mirroring
/// [`crate::domain::undo::UndoStack`]'s in-memory behavior but persisted
/// through the store as a plain append-then-truncate list.
pub async fn record_undo(
    ctx: &ToolCallContext,
    entry: UndoEntry,
    max_len: usize,
) -> Result<(), AgentError> {
    let ns = ctx.namespace("undo");
    let store = ctx.store()?;
    let mut keys = store
        .list(&ns)
        .await
        .map_err(|e| AgentError::Internal(e.to_string()))?;
    keys.sort();
    store
        .put(&ns, &entry.id, &json!(entry))
        .await
        .map_err(|e| AgentError::Internal(e.to_string()))?;
    keys.push(entry.id);
    if keys.len() > max_len {
        let overflow = keys.len() - max_len;
        for key in keys.into_iter().take(overflow) {
            store
                .delete(&ns, &key)
                .await
                .map_err(|e| AgentError::Internal(e.to_string()))?;
        }
    }
    Ok(())
}

pub struct UndoLast;

#[async_trait]
impl Tool for UndoLast {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "undo_last",
            "Reverts the most recent reversible action this agent took.",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn call(&self, _params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        let ns = ctx.namespace("undo");
        let store = ctx.store()?;
        let mut keys = store
            .list(&ns)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        keys.sort();
        let last_key = keys
            .pop()
            .ok_or_else(|| AgentError::NotFound("undo stack is empty".into()))?;

        let value = store
            .get(&ns, &last_key)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?
            .ok_or_else(|| AgentError::NotFound("undo entry vanished".into()))?;
        let entry: UndoEntry = serde_json::from_value(value)
            .map_err(|e| AgentError::Internal(format!("corrupt undo entry: {e}")))?;

        store
            .delete(&ns, &last_key)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;

        let inverse = entry
            .inverse_action
            .ok_or_else(|| AgentError::ValidationError(format!("{} is not reversible", entry.original_tool)))?;

        // The engine re-dispatches `inverseTool`/`inverseParams` through its
        // own registry after this call returns, rather than this tool doing
        // it directly — that keeps `UndoLast` from needing a registry handle
        // and avoids it recording a fresh undo entry for its own effect.
        Ok(json!({"reverted": entry.original_tool, "inverseTool": inverse.tool, "inverseParams": inverse.params}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    fn ctx() -> ToolCallContext {
        ToolCallContext::new("u1", "a1").with_store(Arc::new(InMemoryStore::new()))
    }

    fn entry(id: &str) -> UndoEntry {
        UndoEntry {
            id: id.into(),
            original_tool: "create_note".into(),
            original_params: json!({"title": id}),
            inverse_action: Some(crate::domain::undo::InverseAction {
                tool: "delete_note".into(),
                params: json!({"title": id}),
            }),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn undo_last_pops_most_recent_entry() {
        let ctx = ctx();
        record_undo(&ctx, entry("e1"), 10).await.unwrap();
        record_undo(&ctx, entry("e2"), 10).await.unwrap();

        let result = UndoLast.call(json!({}), &ctx).await.unwrap();
        assert_eq!(result["inverseTool"], json!("delete_note"));

        let ns = ctx.namespace("undo");
        let remaining = ctx.store().unwrap().list(&ns).await.unwrap();
        assert_eq!(remaining, vec!["e1"]);
    }

    #[tokio::test]
    async fn empty_stack_is_not_found() {
        let ctx = ctx();
        let err = UndoLast.call(json!({}), &ctx).await;
        assert!(matches!(err, Err(AgentError::NotFound(_))));
    }

    #[tokio::test]
    async fn non_reversible_entry_is_a_validation_error() {
        let ctx = ctx();
        let mut e = entry("e1");
        e.inverse_action = None;
        record_undo(&ctx, e, 10).await.unwrap();
        let err = UndoLast.call(json!({}), &ctx).await;
        assert!(matches!(err, Err(AgentError::ValidationError(_))));
    }
}
