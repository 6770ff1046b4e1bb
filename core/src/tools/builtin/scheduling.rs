//! `set_reminder` / `cancel_reminder` — the tool-facing bridge onto
//! [`crate::domain::ScheduledTask`] rows; [`crate::scheduler`] is the
//! component that actually evaluates and fires them. These tools only
//! persist/remove rows under the agent's `schedules` namespace (spec.md §6).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{Permissions, ScheduledTask, ToolDefinition};
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};

fn require_scheduler_access(permissions: &Permissions) -> Result<(), AgentError> {
    if !permissions.scheduler_access {
        return Err(AgentError::PermissionDenied("schedulerAccess".into()));
    }
    Ok(())
}

pub struct SetReminder;

#[async_trait]
impl Tool for SetReminder {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "set_reminder",
            "Schedules a one-shot reminder that fires once at an absolute UTC instant.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "trigger_at": {"type": "string", "format": "date-time"},
                    "message": {"type": "string"}
                },
                "required": ["name", "trigger_at", "message"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        require_scheduler_access(&ctx.permissions)?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing name".into()))?;
        let trigger_at_str = params
            .get("trigger_at")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing trigger_at".into()))?;
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing message".into()))?;
        let trigger_at = chrono::DateTime::parse_from_rfc3339(trigger_at_str)
            .map_err(|e| AgentError::ValidationError(format!("invalid trigger_at: {e}")))?
            .with_timezone(&chrono::Utc);

        let task = ScheduledTask {
            id: uuid::Uuid::new_v4().to_string(),
            owner_scope: format!("user:{}:agent:{}", ctx.user_id, ctx.agent_id),
            name: name.to_string(),
            cron_expression: None,
            instruction: message.to_string(),
            enabled: true,
            timezone: "UTC".to_string(),
            one_shot: true,
            trigger_at: Some(trigger_at),
            last_run_at: None,
            last_status: None,
            created_at: chrono::Utc::now(),
            start_at: None,
        };
        let ns = ctx.namespace("schedules");
        ctx.store()?
            .put(&ns, &task.id, &json!(task))
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(json!({"id": task.id}))
    }
}

pub struct CancelReminder;

#[async_trait]
impl Tool for CancelReminder {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "cancel_reminder",
            "Cancels a scheduled reminder by id before it fires.",
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        require_scheduler_access(&ctx.permissions)?;
        let id = params
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing id".into()))?;

        let ns = ctx.namespace("schedules");
        let store = ctx.store()?;
        if store
            .get(&ns, id)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?
            .is_none()
        {
            return Err(AgentError::NotFound(format!("scheduled task {id}")));
        }
        store
            .delete(&ns, id)
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(json!({"cancelled": id}))
    }
}
