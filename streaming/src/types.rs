//! Wire request bodies accepted by the streaming routes. Response frames are
//! [`optimaizer_protocol::ProtocolEvent`]; these types are the JSON the
//! client posts to start a stream.

use serde::Deserialize;

use optimaizer_core::domain::ConversationTurn;

/// One provider target: which registered [`optimaizer_core::LlmClient`] to
/// invoke and which model name to pass through in the request.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderTarget {
    pub provider: String,
    #[serde(default)]
    pub model: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatStreamRequest {
    /// Caller-supplied id; a fresh one is generated when absent. Submitting
    /// an id already in flight cancels and replaces that stream.
    #[serde(default, rename = "requestId")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub target: ProviderTarget,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub tool_choice: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CouncilStreamRequest {
    #[serde(default, rename = "requestId")]
    pub request_id: Option<String>,
    pub members: Vec<ProviderTarget>,
    pub leader: ProviderTarget,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    /// When true, member responses are labeled `A..N` instead of `1..N` in
    /// the leader's synthesis prompt, withholding ordinal hints.
    #[serde(default)]
    pub blind: bool,
}
