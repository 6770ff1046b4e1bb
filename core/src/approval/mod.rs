//! Approval Gate & Security Pre-Checks (spec.md §4.5). [`validator`] is the
//! static block-list stage; [`gate::ApprovalGate`] is the blocking
//! out-of-band confirmation stage that [`crate::engine`] routes the critical
//! tool subset ([`gate::CRITICAL_TOOLS`]) through before dispatch.

mod gate;
pub mod validator;

pub use gate::{requires_approval, ApprovalGate, CRITICAL_TOOLS, DEFAULT_APPROVAL_TIMEOUT};
