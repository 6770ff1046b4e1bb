use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a tool may run concurrently with its siblings in a batch.
///
/// `ReadOnly` tools are parallel-safe and fan out concurrently; `Mutating`
/// tools run strictly sequentially in original call order (spec §4.2 step 4).
/// Tools registered under the external-tool prefix default to `Mutating`
/// (see [`crate::tools::registry::ToolRegistry::classify`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffectClass {
    ReadOnly,
    Mutating,
}

/// `{name, description, parameterSchema, sideEffectClass, executor}`. Static
/// at startup plus dynamically registered external tools (prefixed). The
/// `executor` is not part of this record — it is resolved by name through
/// [`crate::tools::registry::ToolRegistry`], keeping the data model free of
/// trait objects so it can round-trip through the store for inspection/audit.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameter_schema: Value,
    pub side_effect_class: SideEffectClass,
}

impl ToolDefinition {
    pub fn read_only(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: schema,
            side_effect_class: SideEffectClass::ReadOnly,
        }
    }

    pub fn mutating(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: schema,
            side_effect_class: SideEffectClass::Mutating,
        }
    }
}

/// `{correlationId, name, params}`. One call the model asked the engine to
/// dispatch; the `correlationId` ties it to its eventual [`ToolResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub correlation_id: String,
    pub name: String,
    pub params: Value,
}

/// `{correlationId, success, result, error}`. One-to-one with a [`ToolCall`].
/// A thrown exception inside a tool is converted to `success: false` with an
/// error string; it never aborts the turn (spec §4.2 "Error policy").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub correlation_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(correlation_id: impl Into<String>, result: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(correlation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}
