//! Context passed into a tool call for the current turn (spec.md §4.2).
//!
//! Tools that need conversation history (e.g. a "recent messages" lookup)
//! or want to emit progress events read this; most tools ignore it.

use std::sync::Arc;

use crate::domain::{ConversationTurn, Permissions};
use crate::store::Store;
use crate::stream::ToolStreamWriter;

/// Per-call context the engine builds once per turn and hands to every tool
/// it dispatches from that turn's batch.
#[derive(Clone)]
pub struct ToolCallContext {
    pub user_id: String,
    pub agent_id: String,
    /// Conversation history up to (not including) the current turn.
    pub history: Vec<ConversationTurn>,
    pub stream_writer: ToolStreamWriter,
    /// The calling agent's permission bitset; every tool whose category gate
    /// exists checks this before producing any side effect (spec.md §3
    /// Permissions invariant).
    pub permissions: Permissions,
    /// The keyed store scoped to this agent's namespaces; `None` in tests
    /// that don't exercise persistence.
    pub store: Option<Arc<dyn Store>>,
}

impl ToolCallContext {
    pub fn new(user_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            agent_id: agent_id.into(),
            history: Vec::new(),
            stream_writer: ToolStreamWriter::noop(),
            permissions: Permissions::default(),
            store: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_stream_writer(mut self, writer: ToolStreamWriter) -> Self {
        self.stream_writer = writer;
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Namespace prefix for this context's agent, per the `user:<userId>:agent:<agentId>:<collection>`
    /// key layout (spec.md §6).
    pub fn namespace(&self, collection: &str) -> crate::store::Namespace {
        crate::store::agent_namespace(&self.user_id, &self.agent_id, collection)
    }

    /// The store, or an `Internal` error if this context was built without
    /// one (a programming error — every non-test call site must provide it).
    pub fn store(&self) -> Result<&Arc<dyn Store>, crate::error::AgentError> {
        self.store
            .as_ref()
            .ok_or_else(|| crate::error::AgentError::Internal("no store configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let ctx = ToolCallContext::new("u1", "a1").with_history(vec![ConversationTurn::user("hi")]);
        assert_eq!(ctx.user_id, "u1");
        assert_eq!(ctx.agent_id, "a1");
        assert_eq!(ctx.history.len(), 1);
    }
}
