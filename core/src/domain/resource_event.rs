use serde::{Deserialize, Serialize};

/// `{id, agentId, toolName, correlationId, requiredApproval, approved,
/// success, occurredAt}`. Append-only (spec.md §6 `user_resource_events`):
/// one entry per dispatched tool call, including calls the approval gate
/// denied before they ever reached the registry (spec.md §8 scenario 6
/// "audit entry with `approved=false` persisted"). `approved` is `None` for
/// calls outside the critical subset, which never go through the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub id: String,
    pub agent_id: String,
    pub tool_name: String,
    pub correlation_id: String,
    pub required_approval: bool,
    pub approved: Option<bool>,
    pub success: bool,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl ResourceEvent {
    pub fn new(
        agent_id: impl Into<String>,
        tool_name: impl Into<String>,
        correlation_id: impl Into<String>,
        required_approval: bool,
        approved: Option<bool>,
        success: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            tool_name: tool_name.into(),
            correlation_id: correlation_id.into(),
            required_approval,
            approved,
            success,
            occurred_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_denied_critical_call_records_approved_false() {
        let event = ResourceEvent::new("a1", "run_terminal_command", "c1", true, Some(false), false);
        assert_eq!(event.approved, Some(false));
        assert!(!event.success);
    }

    #[test]
    fn a_non_critical_call_records_no_approval_decision() {
        let event = ResourceEvent::new("a1", "search_notes", "c1", false, None, true);
        assert_eq!(event.approved, None);
    }
}
