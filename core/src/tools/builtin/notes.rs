//! `create_note` / `search_notes` / `delete_note` — the simplest user-visible
//! collection, backed directly by the Keyed Store under the agent's `notes`
//! namespace (spec.md §6 persistence key layout). Grounded on the store's own
//! `search_simple` convenience method.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{Permissions, ToolDefinition};
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};

fn require_notes_access(permissions: &Permissions) -> Result<(), AgentError> {
    if !permissions.notes_access {
        return Err(AgentError::PermissionDenied("notesAccess".into()));
    }
    Ok(())
}

pub struct CreateNote;

#[async_trait]
impl Tool for CreateNote {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "create_note",
            "Creates a note with a title and body text.",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "body": {"type": "string"}
                },
                "required": ["title", "body"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        require_notes_access(&ctx.permissions)?;
        let title = params
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing title".into()))?;
        let body = params
            .get("body")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing body".into()))?;

        let note = json!({"title": title, "body": body, "createdAt": chrono::Utc::now()});
        let ns = ctx.namespace("notes");
        ctx.store()?
            .put(&ns, title, &note)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(json!({"title": title}))
    }
}

pub struct SearchNotes;

#[async_trait]
impl Tool for SearchNotes {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::read_only(
            "search_notes",
            "Searches notes by a text query, returning matching titles and bodies.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer"}
                },
                "required": ["query"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        require_notes_access(&ctx.permissions)?;
        let query = params.get("query").and_then(Value::as_str);
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize);

        let ns = ctx.namespace("notes");
        let hits = ctx
            .store()?
            .search_simple(&ns, query, limit)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(json!(hits
            .into_iter()
            .map(|h| json!({"title": h.key, "note": h.value}))
            .collect::<Vec<_>>()))
    }
}

pub struct DeleteNote;

#[async_trait]
impl Tool for DeleteNote {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "delete_note",
            "Deletes a note by its title.",
            json!({
                "type": "object",
                "properties": {"title": {"type": "string"}},
                "required": ["title"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        require_notes_access(&ctx.permissions)?;
        let title = params
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing title".into()))?;

        let ns = ctx.namespace("notes");
        let store = ctx.store()?;
        if store
            .get(&ns, title)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?
            .is_none()
        {
            return Err(AgentError::NotFound(format!("note {title}")));
        }
        store
            .delete(&ns, title)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(json!({"deleted": title}))
    }
}
