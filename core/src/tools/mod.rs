//! Tool Registry & dispatch (spec.md §2, §4.2). [`Tool`] is the executor
//! trait; [`ToolRegistry`] holds the declarative list; [`partition_and_dispatch`]
//! implements the parallel/sequential partition that the conversation engine
//! drives. [`builtin`] holds the in-scope, concrete tool implementations
//! (notes, memory, scheduling, approval-gated terminal/code execution); the
//! concrete third-party clients spec.md §1 treats as external collaborators
//! (calendar, email, home automation, media, messaging) are modeled as ports
//! in [`builtin::calendar`] and [`crate::transport`] rather than real SDKs.

mod batch;
pub mod builtin;
mod context;
mod registry;
mod r#trait;

pub use batch::partition_and_dispatch;
pub use context::ToolCallContext;
pub use r#trait::Tool;
pub use registry::{ToolRegistry, EXTERNAL_TOOL_PREFIX};
