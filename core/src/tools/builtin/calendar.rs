//! `create_calendar_event` — models the calendar as an external collaborator
//! port (spec.md §1 "concrete third-party clients ... are out of scope,
//! treated as external collaborators"). [`CalendarBackend`] is the trait a
//! real calendar SDK would implement; [`CreateCalendarEvent`] wraps it with
//! the idempotency fingerprint spec.md §4.2 step 6 names explicitly:
//! `(userId, agentId, calendarBackend, normalized(title), start, end,
//! description, location, allDay)`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::{Permissions, ToolDefinition};
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};

/// A calendar provider's create-event capability. The concrete client (a
/// real calendar SDK) lives outside this crate; this trait is the seam.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Stable name used in the idempotency fingerprint (e.g. `"google"`).
    fn backend_name(&self) -> &str;

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, AgentError>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    pub start: chrono::DateTime<chrono::Utc>,
    pub end: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub all_day: bool,
}

pub struct CreateCalendarEvent {
    pub backend: std::sync::Arc<dyn CalendarBackend>,
}

impl CreateCalendarEvent {
    pub fn new(backend: std::sync::Arc<dyn CalendarBackend>) -> Self {
        Self { backend }
    }
}

fn parse_event(params: &Value) -> Result<CalendarEvent, AgentError> {
    let title = params
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ValidationError("missing title".into()))?
        .to_string();
    let start = params
        .get("start")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ValidationError("missing start".into()))?;
    let end = params
        .get("end")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ValidationError("missing end".into()))?;
    let start = chrono::DateTime::parse_from_rfc3339(start)
        .map_err(|e| AgentError::ValidationError(format!("invalid start: {e}")))?
        .with_timezone(&chrono::Utc);
    let end = chrono::DateTime::parse_from_rfc3339(end)
        .map_err(|e| AgentError::ValidationError(format!("invalid end: {e}")))?
        .with_timezone(&chrono::Utc);
    let description = params
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let location = params
        .get("location")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let all_day = params
        .get("all_day")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(CalendarEvent {
        title,
        start,
        end,
        description,
        location,
        all_day,
    })
}

/// Lowercases and collapses interior whitespace, matching spec.md's
/// `normalized(title)` fingerprint component.
fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[async_trait]
impl Tool for CreateCalendarEvent {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::mutating(
            "create_calendar_event",
            "Creates a calendar event with a title, start/end time, optional description and location.",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "start": {"type": "string", "format": "date-time"},
                    "end": {"type": "string", "format": "date-time"},
                    "description": {"type": "string"},
                    "location": {"type": "string"},
                    "all_day": {"type": "boolean"}
                },
                "required": ["title", "start", "end"]
            }),
        )
    }

    fn idempotency_key(&self, params: &Value, ctx: &ToolCallContext) -> Option<String> {
        let event = parse_event(params).ok()?;
        Some(format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:{}",
            ctx.user_id,
            ctx.agent_id,
            self.backend.backend_name(),
            normalize_title(&event.title),
            event.start.to_rfc3339(),
            event.end.to_rfc3339(),
            event.description,
            event.location,
            event.all_day,
        ))
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        if !ctx.permissions.calendar_access {
            return Err(AgentError::PermissionDenied("calendarAccess".into()));
        }
        let event = parse_event(&params)?;
        let event_id = self.backend.create_event(&event).await?;
        Ok(json!({"eventId": event_id, "title": event.title}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct CountingBackend {
        calls: AtomicU64,
    }

    #[async_trait]
    impl CalendarBackend for CountingBackend {
        fn backend_name(&self) -> &str {
            "testcal"
        }

        async fn create_event(&self, _event: &CalendarEvent) -> Result<String, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("evt-{n}"))
        }
    }

    fn ctx() -> ToolCallContext {
        ToolCallContext::new("u1", "a1").with_permissions(Permissions {
            calendar_access: true,
            ..Permissions::default()
        })
    }

    fn event_params(title: &str) -> Value {
        json!({
            "title": title,
            "start": "2030-01-01T09:00:00Z",
            "end": "2030-01-01T10:00:00Z",
        })
    }

    #[tokio::test]
    async fn identical_calls_share_a_fingerprint() {
        let tool = CreateCalendarEvent::new(Arc::new(CountingBackend { calls: AtomicU64::new(0) }));
        let ctx = ctx();
        let a = tool.idempotency_key(&event_params("Team Sync"), &ctx);
        let b = tool.idempotency_key(&event_params("  Team   Sync "), &ctx);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn distinct_titles_have_distinct_fingerprints() {
        let tool = CreateCalendarEvent::new(Arc::new(CountingBackend { calls: AtomicU64::new(0) }));
        let ctx = ctx();
        let a = tool.idempotency_key(&event_params("Team Sync"), &ctx);
        let b = tool.idempotency_key(&event_params("1:1"), &ctx);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn without_permission_the_call_is_denied() {
        let tool = CreateCalendarEvent::new(Arc::new(CountingBackend { calls: AtomicU64::new(0) }));
        let ctx = ToolCallContext::new("u1", "a1");
        let err = tool.call(event_params("Team Sync"), &ctx).await;
        assert!(matches!(err, Err(AgentError::PermissionDenied(_))));
    }
}
