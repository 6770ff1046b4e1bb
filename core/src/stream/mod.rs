//! Token streaming plumbing shared by the turn loop and tool execution.
//!
//! The engine forwards provider tokens to a user-facing channel immediately
//! and buffers them for internal stimuli (scheduler fires); tools use
//! [`ToolStreamWriter`] to emit progress without needing to know whether
//! streaming is active. The wire-level SSE framing lives in the streaming
//! dispatcher crate, not here — this module only carries chunks in-process.

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

/// One chunk of streamed assistant content.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageChunk {
    pub content: String,
}

/// Type-erased writer for tools to emit progress events without depending on
/// a particular transport or channel type.
#[derive(Clone)]
pub struct ToolStreamWriter {
    emit_fn: Arc<dyn Fn(Value) -> bool + Send + Sync>,
}

impl ToolStreamWriter {
    pub fn new(emit_fn: impl Fn(Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            emit_fn: Arc::new(emit_fn),
        }
    }

    /// A writer that discards everything; used when no caller is listening.
    pub fn noop() -> Self {
        Self {
            emit_fn: Arc::new(|_| false),
        }
    }

    /// Emits a custom JSON payload. Returns `true` if accepted by the sink.
    pub fn emit_custom(&self, value: Value) -> bool {
        (self.emit_fn)(value)
    }
}

impl Debug for ToolStreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStreamWriter").finish_non_exhaustive()
    }
}

impl Default for ToolStreamWriter {
    fn default() -> Self {
        Self::noop()
    }
}
