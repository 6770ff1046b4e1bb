use async_trait::async_trait;
use serde_json::Value;

use super::context::ToolCallContext;
use crate::domain::ToolDefinition;
use crate::error::AgentError;

/// A single tool the model can invoke (spec.md §2 "Tool Registry").
///
/// Implementations are registered by name in [`super::registry::ToolRegistry`];
/// the engine resolves a [`crate::domain::ToolCall`] to its `Tool` by name and
/// calls it, converting any `Err` into a `{success:false, error}`
/// [`crate::domain::ToolResult`] — a thrown error never aborts the turn
/// (spec.md §4.2 "Error policy").
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static definition: name, description, JSON-Schema params, side-effect
    /// class. The side-effect class drives partitioning in
    /// [`super::batch::partition_and_dispatch`].
    fn definition(&self) -> ToolDefinition;

    /// For idempotency-sensitive tools (spec.md §4.2 step 6, e.g. calendar
    /// event creation): a stable fingerprint over this call's normalized
    /// params. `None` (the default) means the tool is not subject to
    /// dedup — most tools. When two calls to the same tool produce the same
    /// key within the registry's dedup window, only the first actually
    /// reaches `call`; the second gets a synthetic "already done" result.
    fn idempotency_key(&self, _params: &Value, _ctx: &ToolCallContext) -> Option<String> {
        None
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError>;
}
