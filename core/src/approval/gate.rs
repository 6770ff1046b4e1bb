//! Blocking approval gate (spec.md §4.5 stage 2), generalizing the teacher's
//! `ApprovalPolicy`/`tools_requiring_approval` prompt-engineering signal into
//! a real out-of-band confirmation: a `oneshot` channel keyed by correlation
//! id, resolved by an external responder (the messaging transport's
//! inline-keyboard callback), with a `tokio::time::timeout` enforcing
//! deny-by-default.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};

/// Tool names in the critical subset spec.md §4.2 step 5 names explicitly:
/// sending a message to third parties, sending/replying to email, calendar
/// mutation, home-automation state changes, media-library deletion, terminal
/// commands, and code execution. Membership here — not a field on
/// `ToolDefinition` — drives whether [`crate::engine`] routes a call through
/// this gate before dispatch.
pub const CRITICAL_TOOLS: &[&str] = &[
    "send_telegram_message",
    "send_email",
    "create_calendar_event",
    "update_calendar_event",
    "delete_calendar_event",
    "set_home_automation_state",
    "delete_media",
    "run_terminal_command",
    "run_code",
];

pub fn requires_approval(tool_name: &str) -> bool {
    CRITICAL_TOOLS.contains(&tool_name)
}

/// Default session-idle approval timeout (spec.md §5 "session idle approval
/// 30 s").
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide table of pending approvals, keyed by correlation id. A
/// second `request` for the same id replaces the first's sender (the first
/// waiter then observes a dropped channel, which resolves to deny).
#[derive(Clone, Default)]
pub struct ApprovalGate {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `respond` is called for `correlation_id` or `timeout`
    /// elapses, whichever comes first. Times out (and any dropped sender) to
    /// `false` — deny-by-default.
    pub async fn request(&self, correlation_id: &str, timeout: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(correlation_id.to_string(), tx);

        let approved = tokio::time::timeout(timeout, rx).await;

        self.pending.lock().await.remove(correlation_id);

        matches!(approved, Ok(Ok(true)))
    }

    /// Resolves a pending approval. Returns `false` if no request is pending
    /// under `correlation_id` (already timed out, or never requested).
    pub async fn respond(&self, correlation_id: &str, approved: bool) -> bool {
        if let Some(tx) = self.pending.lock().await.remove(correlation_id) {
            tx.send(approved).is_ok()
        } else {
            false
        }
    }
}
