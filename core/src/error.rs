//! Error taxonomy (spec.md §7). Every kind is a structured result surfaced
//! to the model (inside a tool result), the transport (inside an SSE `error`
//! frame), or the runtime manager (a failed `deploy`) — never a panic.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Multiple candidates matched a "by text/date" lookup; non-fatal, the
    /// model is expected to ask the user to disambiguate.
    #[error("ambiguous: {0} candidates")]
    Ambiguous(Vec<String>),

    #[error("external error: {0}")]
    ExternalError(String),

    #[error("approval denied")]
    ApprovalDenied,

    #[error("approval timed out")]
    ApprovalTimeout,

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Stable machine-readable tag for the error kind, independent of the
    /// (possibly redacted) message — used by callers that branch on kind
    /// without string-matching `Display` output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::ValidationError(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Ambiguous(_) => "ambiguous",
            Self::ExternalError(_) => "external_error",
            Self::ApprovalDenied => "approval_denied",
            Self::ApprovalTimeout => "approval_timeout",
            Self::BudgetExceeded(_) => "budget_exceeded",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Redacts credential-shaped substrings from an error string before it is
/// shown to a transport, logged, or surfaced to the model (spec.md §7 "never
/// leak credentials, tokens, or file paths"). Conservative: patterns it
/// doesn't recognize pass through unchanged.
pub fn redact(message: &str) -> String {
    let mut out = message.to_string();

    // Credential envelopes: encwc.v1:<iv>:<tag>:<ciphertext>
    out = redact_prefixed(&out, "encwc.v1:", ":::");

    // Common bearer/API-key shapes.
    out = redact_token_after(&out, "Bearer ");
    out = redact_token_after(&out, "bot");
    out = redact_token_after(&out, "sk-");
    out = redact_token_after(&out, "api_key=");
    out = redact_token_after(&out, "token=");

    out
}

fn redact_prefixed(input: &str, prefix: &str, _sep: &str) -> String {
    if let Some(start) = input.find(prefix) {
        let rest = &input[start + prefix.len()..];
        let end = rest
            .find(|c: char| c.is_whitespace())
            .map(|i| start + prefix.len() + i)
            .unwrap_or(input.len());
        let mut out = input[..start].to_string();
        out.push_str("[REDACTED]");
        out.push_str(&input[end..]);
        out
    } else {
        input.to_string()
    }
}

fn redact_token_after(input: &str, marker: &str) -> String {
    if let Some(start) = input.find(marker) {
        let tail_start = start + marker.len();
        if tail_start > input.len() {
            return input.to_string();
        }
        let rest = &input[tail_start..];
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '&' || c == '"')
            .map(|i| tail_start + i)
            .unwrap_or(input.len());
        // Only redact if there is at least one non-whitespace char to hide.
        if end == tail_start {
            return input.to_string();
        }
        let mut out = input[..tail_start].to_string();
        out.push_str("[REDACTED]");
        out.push_str(&input[end..]);
        out
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_and_string_independent() {
        assert_eq!(AgentError::ApprovalDenied.kind(), "approval_denied");
        assert_eq!(
            AgentError::ValidationError("x".into()).kind(),
            "validation_error"
        );
    }

    #[test]
    fn redacts_credential_envelope() {
        let msg = "failed to decrypt encwc.v1:abc:def:ghi for user 42";
        let redacted = redact(msg);
        assert!(!redacted.contains("abc:def:ghi"));
        assert!(redacted.contains("[REDACTED]"));
        assert!(redacted.contains("for user 42"));
    }

    #[test]
    fn redacts_bearer_token() {
        let msg = "upstream call failed: Authorization: Bearer sk-abcdef123456 rejected";
        let redacted = redact(msg);
        assert!(!redacted.contains("sk-abcdef123456"));
    }

    #[test]
    fn passes_through_plain_message() {
        let msg = "calendar event not found";
        assert_eq!(redact(msg), msg);
    }
}
