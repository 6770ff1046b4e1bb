use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::context::ToolCallContext;
use super::r#trait::Tool;
use crate::cache::{Cache, InMemoryCache};
use crate::domain::{SideEffectClass, ToolDefinition};
use crate::error::AgentError;

/// Prefix for dynamically registered external tools (spec.md §4.2: "Tools
/// with names beginning with the external-tool prefix ... are treated as
/// Mutating by default").
pub const EXTERNAL_TOOL_PREFIX: &str = "mcp_";

/// Dedup window for idempotency-fingerprinted tool calls (spec.md §4.2 step
/// 6, §9 open question "short window" resolved to two minutes in DESIGN.md).
const IDEMPOTENCY_WINDOW: Duration = Duration::from_secs(120);

/// Declarative list of [`Tool`] executors keyed by name (spec.md §2 "Tool
/// Registry"). Static tools are registered at startup; external tools may be
/// added later under [`EXTERNAL_TOOL_PREFIX`].
///
/// Holds a shared [`InMemoryCache`] keyed by `(tool name, fingerprint)` for
/// tools that opt into [`Tool::idempotency_key`] — a second call with the
/// same fingerprint inside the dedup window is short-circuited to the first
/// call's recorded result instead of reaching the tool again.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    idempotency: Arc<InMemoryCache<String, Value>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self {
            tools: HashMap::new(),
            idempotency: Arc::new(InMemoryCache::new()),
        }
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Side-effect class for a registered tool. An unregistered name (most
    /// commonly a dynamically-discovered external tool whose definition
    /// hasn't been fetched yet) classifies safely as Mutating regardless of
    /// the external-tool prefix (spec.md §4.2 "names beginning with the
    /// external-tool prefix are Mutating by default" — and so is anything
    /// else this registry doesn't recognize at all).
    pub fn classify(&self, name: &str) -> SideEffectClass {
        match self.tools.get(name) {
            Some(tool) => tool.definition().side_effect_class,
            None => SideEffectClass::Mutating,
        }
    }

    pub async fn call(
        &self,
        name: &str,
        params: Value,
        ctx: &ToolCallContext,
    ) -> Result<Value, AgentError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::NotFound(format!("tool {name}")))?;

        let fingerprint = tool.idempotency_key(&params, ctx);
        let cache_key = fingerprint.as_ref().map(|fp| format!("{name}:{fp}"));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.idempotency.get(key).await {
                return Ok(cached);
            }
        }

        let result = tool.call(params, ctx).await?;

        if let Some(key) = cache_key {
            let _ = self
                .idempotency
                .set(key, result.clone(), Some(IDEMPOTENCY_WINDOW))
                .await;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::read_only("echo", "echoes params", serde_json::json!({}))
        }

        async fn call(&self, params: Value, _ctx: &ToolCallContext) -> Result<Value, AgentError> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn registers_and_calls_by_name() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Echo));
        let ctx = ToolCallContext::new("u1", "a1");
        let result = reg
            .call("echo", serde_json::json!({"x": 1}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let reg = ToolRegistry::new();
        let ctx = ToolCallContext::new("u1", "a1");
        let err = reg.call("missing", serde_json::json!({}), &ctx).await;
        assert!(matches!(err, Err(AgentError::NotFound(_))));
    }

    #[test]
    fn external_prefixed_unknown_tool_classifies_mutating() {
        let reg = ToolRegistry::new();
        assert_eq!(reg.classify("mcp_anything"), SideEffectClass::Mutating);
    }

    #[test]
    fn registered_tool_classifies_by_its_definition() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Echo));
        assert_eq!(reg.classify("echo"), SideEffectClass::ReadOnly);
    }

    struct CountingIdempotent {
        calls: std::sync::atomic::AtomicU64,
    }

    #[async_trait]
    impl Tool for CountingIdempotent {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::mutating("book", "books a slot", serde_json::json!({}))
        }

        fn idempotency_key(&self, params: &Value, _ctx: &ToolCallContext) -> Option<String> {
            params.get("slot").map(|v| v.to_string())
        }

        async fn call(&self, params: Value, _ctx: &ToolCallContext) -> Result<Value, AgentError> {
            let n = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                + 1;
            Ok(serde_json::json!({"slot": params["slot"], "callNumber": n}))
        }
    }

    #[tokio::test]
    async fn second_call_with_same_fingerprint_is_deduped() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(CountingIdempotent {
            calls: std::sync::atomic::AtomicU64::new(0),
        }));
        let ctx = ToolCallContext::new("u1", "a1");

        let first = reg
            .call("book", serde_json::json!({"slot": "9am"}), &ctx)
            .await
            .unwrap();
        let second = reg
            .call("book", serde_json::json!({"slot": "9am"}), &ctx)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first["callNumber"], 1);
    }

    #[tokio::test]
    async fn distinct_fingerprints_both_execute() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(CountingIdempotent {
            calls: std::sync::atomic::AtomicU64::new(0),
        }));
        let ctx = ToolCallContext::new("u1", "a1");

        let first = reg
            .call("book", serde_json::json!({"slot": "9am"}), &ctx)
            .await
            .unwrap();
        let second = reg
            .call("book", serde_json::json!({"slot": "10am"}), &ctx)
            .await
            .unwrap();

        assert_eq!(first["callNumber"], 1);
        assert_eq!(second["callNumber"], 2);
    }
}
