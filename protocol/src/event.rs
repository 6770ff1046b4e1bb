//! Wire shape of one SSE frame (spec.md §6 "SSE frames").
//!
//! `data: {"type":"meta","requestId":"…"}` through to the terminal
//! `done|cancelled|error` frame. Council adds `phase` and per-member
//! variants. Every request emits exactly one `meta` frame first and exactly
//! one terminal frame (`done`, `cancelled`, or `error`) last.

use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CouncilPhase {
    Members,
    Leader,
    LeaderRetry,
    LeaderPartial,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    Meta {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Token {
        content: String,
    },
    /// Council member token, tagged with the member's index (spec.md §4.4).
    MemberToken {
        member: usize,
        content: String,
    },
    MemberComplete {
        member: usize,
    },
    MemberError {
        member: usize,
        error: String,
    },
    Phase {
        phase: CouncilPhase,
    },
    Done,
    Cancelled,
    Error {
        error: String,
    },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (the SSE `data:` payload).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// True for the three terminal frame kinds; a stream emits exactly one
    /// of these as its last frame (spec.md §8 "testable properties").
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_serializes_camel_case_request_id() {
        let ev = ProtocolEvent::Meta {
            request_id: "r1".into(),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["type"], "meta");
        assert_eq!(v["requestId"], "r1");
    }

    #[test]
    fn terminal_frames_are_classified() {
        assert!(ProtocolEvent::Done.is_terminal());
        assert!(ProtocolEvent::Cancelled.is_terminal());
        assert!(ProtocolEvent::Error { error: "x".into() }.is_terminal());
        assert!(!ProtocolEvent::Token { content: "x".into() }.is_terminal());
    }
}
