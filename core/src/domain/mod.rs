//! Entity types of the agent runtime's data model. These are plain, storage-
//! agnostic structs persisted through the [`crate::store::Store`] port under
//! `(userId, agentId)`-scoped namespaces; see [`crate::store::agent_namespace`].

mod agent_config;
mod cache_entry;
mod conversation;
mod location;
mod resource_event;
mod schedule;
mod stream_registration;
mod subscription;
mod tool;
mod undo;
mod usage_event;
mod working_memory;

pub use agent_config::{AgentConfig, Permissions};
pub use cache_entry::CacheEntry;
pub use conversation::{ConversationTurn, Role};
pub use location::LocationReminder;
pub use resource_event::ResourceEvent;
pub use schedule::ScheduledTask;
pub use stream_registration::StreamRegistration;
pub use subscription::{EventSubscription, SubscriptionType};
pub use tool::{SideEffectClass, ToolCall, ToolDefinition, ToolResult};
pub use undo::UndoEntry;
pub use usage_event::UsageEvent;
pub use working_memory::WorkingMemoryEntry;
