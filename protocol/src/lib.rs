//! SSE wire protocol for the Streaming Dispatcher (spec.md §4.4, §6).
//!
//! This crate defines only the wire shape of one stream frame plus its SSE
//! line framing; it carries no dependency on the engine or provider crates.

pub mod envelope;
pub mod event;

pub use envelope::to_sse_line;
pub use event::{CouncilPhase, ProtocolEvent};
