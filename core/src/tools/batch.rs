//! Parallel-vs-sequential partition (spec.md §4.2 step 4, §9 "Parallel vs
//! sequential partition"). All `ReadOnly` calls in a batch fan out
//! concurrently via `tokio::spawn`; all `Mutating` calls then run strictly
//! sequentially in original order. Index tags on each spawned task guarantee
//! the returned vector is reassembled in the model's original call order —
//! no locking required, grounded on the same `tokio::spawn` + `(index, ...)`
//! tuple idiom [`super::registry`]'s caller uses for the batch tool.

use super::context::ToolCallContext;
use super::registry::ToolRegistry;
use crate::domain::{SideEffectClass, ToolCall, ToolResult};

/// Runs `calls` against `registry`, observing the spec's ordering contract:
/// every `ReadOnly` call in the batch starts concurrently with every other
/// `ReadOnly` call; every `Mutating` call starts only after the full
/// `ReadOnly` fan-out has completed, and runs in original order relative to
/// other `Mutating` calls. The returned vector has the same length and
/// index-to-`correlationId` mapping as `calls`.
pub async fn partition_and_dispatch(
    calls: &[ToolCall],
    registry: &ToolRegistry,
    ctx: &ToolCallContext,
) -> Vec<ToolResult> {
    let mut slots: Vec<Option<ToolResult>> = (0..calls.len()).map(|_| None).collect();

    let mut parallel_indices = Vec::new();
    let mut sequential_indices = Vec::new();
    for (i, call) in calls.iter().enumerate() {
        match registry.classify(&call.name) {
            SideEffectClass::ReadOnly => parallel_indices.push(i),
            SideEffectClass::Mutating => sequential_indices.push(i),
        }
    }

    if !parallel_indices.is_empty() {
        let mut handles = Vec::with_capacity(parallel_indices.len());
        for &i in &parallel_indices {
            let call = calls[i].clone();
            let registry = registry.clone();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                let result = dispatch_one(&call, &registry, &ctx).await;
                (i, result)
            }));
        }
        for handle in handles {
            match handle.await {
                Ok((i, result)) => slots[i] = Some(result),
                Err(join_err) => {
                    // A panicking tool task is converted to an error result,
                    // not propagated — a thrown error never aborts the turn.
                    let i = parallel_indices
                        .iter()
                        .find(|&&i| slots[i].is_none())
                        .copied()
                        .unwrap_or(0);
                    slots[i] = Some(ToolResult::err(
                        calls[i].correlation_id.clone(),
                        format!("tool task panicked: {join_err}"),
                    ));
                }
            }
        }
    }

    for &i in &sequential_indices {
        let result = dispatch_one(&calls[i], registry, ctx).await;
        slots[i] = Some(result);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.unwrap_or_else(|| {
                ToolResult::err(calls[i].correlation_id.clone(), "tool did not run".into())
            })
        })
        .collect()
}

async fn dispatch_one(
    call: &ToolCall,
    registry: &ToolRegistry,
    ctx: &ToolCallContext,
) -> ToolResult {
    match registry
        .call(&call.name, call.params.clone(), ctx)
        .await
    {
        Ok(value) => ToolResult::ok(call.correlation_id.clone(), value),
        Err(e) => ToolResult::err(call.correlation_id.clone(), e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolDefinition;
    use crate::error::AgentError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Records observed start/end times so tests can assert overlap
    /// (parallel) or non-overlap (sequential, ordered) behavior.
    struct TimedTool {
        name: &'static str,
        class: SideEffectClass,
        delay_ms: u64,
        log: Arc<tokio::sync::Mutex<Vec<(String, &'static str)>>>,
    }

    #[async_trait]
    impl super::super::r#trait::Tool for TimedTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_string(),
                description: String::new(),
                parameter_schema: serde_json::json!({}),
                side_effect_class: self.class,
            }
        }

        async fn call(
            &self,
            _params: serde_json::Value,
            _ctx: &ToolCallContext,
        ) -> Result<serde_json::Value, AgentError> {
            self.log
                .lock()
                .await
                .push((self.name.to_string(), "start"));
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.log.lock().await.push((self.name.to_string(), "end"));
            Ok(serde_json::json!("ok"))
        }
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            correlation_id: id.into(),
            name: name.into(),
            params: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn preserves_original_order_and_correlation_ids() {
        let log = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TimedTool {
            name: "a",
            class: SideEffectClass::ReadOnly,
            delay_ms: 5,
            log: log.clone(),
        }));
        registry.register(Arc::new(TimedTool {
            name: "b",
            class: SideEffectClass::Mutating,
            delay_ms: 1,
            log: log.clone(),
        }));
        registry.register(Arc::new(TimedTool {
            name: "c",
            class: SideEffectClass::ReadOnly,
            delay_ms: 5,
            log: log.clone(),
        }));
        registry.register(Arc::new(TimedTool {
            name: "d",
            class: SideEffectClass::Mutating,
            delay_ms: 1,
            log: log.clone(),
        }));

        let calls = vec![call("c1", "a"), call("c2", "b"), call("c3", "c"), call("c4", "d")];
        let ctx = ToolCallContext::new("u1", "a1");
        let results = partition_and_dispatch(&calls, &registry, &ctx).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].correlation_id, "c1");
        assert_eq!(results[1].correlation_id, "c2");
        assert_eq!(results[2].correlation_id, "c3");
        assert_eq!(results[3].correlation_id, "c4");
        assert!(results.iter().all(|r| r.success));

        // All ReadOnly calls start before any Mutating call starts: the
        // sequential batch only begins after the whole parallel fan-out
        // completes (spec.md §9 keeps the simpler "all-parallel-first"
        // shape).
        let entries = log.lock().await;
        let b_start = entries.iter().position(|(n, e)| n == "b" && *e == "start").unwrap();
        let a_end = entries.iter().position(|(n, e)| n == "a" && *e == "end").unwrap();
        let c_end = entries.iter().position(|(n, e)| n == "c" && *e == "end").unwrap();
        assert!(b_start > a_end);
        assert!(b_start > c_end);
    }

    #[tokio::test]
    async fn tool_error_does_not_abort_the_batch() {
        struct Failing;
        #[async_trait]
        impl super::super::r#trait::Tool for Failing {
            fn definition(&self) -> ToolDefinition {
                ToolDefinition::mutating("fail", "", serde_json::json!({}))
            }
            async fn call(
                &self,
                _params: serde_json::Value,
                _ctx: &ToolCallContext,
            ) -> Result<serde_json::Value, AgentError> {
                Err(AgentError::ExternalError("boom".into()))
            }
        }
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Failing));
        let calls = vec![call("c1", "fail")];
        let ctx = ToolCallContext::new("u1", "a1");
        let results = partition_and_dispatch(&calls, &registry, &ctx).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error.as_ref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn result_vector_length_matches_call_count() {
        let counter = Arc::new(AtomicU64::new(0));
        let _ = counter.load(Ordering::SeqCst);
        let registry = ToolRegistry::new();
        let calls = vec![call("c1", "missing")];
        let ctx = ToolCallContext::new("u1", "a1");
        let results = partition_and_dispatch(&calls, &registry, &ctx).await;
        assert_eq!(results.len(), calls.len());
    }
}
