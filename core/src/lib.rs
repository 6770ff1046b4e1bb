//! # optimaizer-core
//!
//! The per-agent execution engine of the optimAIzer multi-tenant personal
//! assistant runtime: the conversation/tool-dispatch turn loop, the tool
//! registry and built-in tools, the scheduler (cron tasks, one-shot
//! triggers, event subscriptions, location reminders), the approval gate,
//! credential encryption, the keyed store port and its in-memory/SQLite
//! implementations, and the agent runtime manager that owns the set of
//! live agents.
//!
//! ## Main modules
//!
//! - [`domain`]: entity types (`AgentConfig`, `Permissions`, `ConversationTurn`,
//!   `ToolDefinition`, `ScheduledTask`, `EventSubscription`, ...).
//! - [`store`]: the keyed store port ([`store::Store`]) plus in-memory and
//!   SQLite implementations.
//! - [`transport`]: the [`transport::MessageTransport`] port and message
//!   chunking helpers.
//! - [`llm`]: the [`llm::LlmClient`] provider port and a [`llm::MockLlm`]
//!   for tests.
//! - [`tools`]: the tool registry, dispatch partitioning, and built-in tools.
//! - [`engine`]: the turn loop ([`engine::run_turn`]) and embedded tool-call
//!   fallback parser.
//! - [`scheduler`]: cron/one-shot/subscription scheduling.
//! - [`approval`]: the approval gate and static command validator.
//! - [`cache`]: a generic TTL cache used by the response cache and others.
//! - [`stream`]: in-process token streaming plumbing.
//! - [`crypto`]: the `encwc.v1` credential envelope (AES-256-GCM, scrypt KDF).
//! - [`runtime`]: the agent runtime manager (deploy/stop/list/auto-start).
//! - [`error`]: the [`error::AgentError`] taxonomy and redaction helper.

pub mod approval;
pub mod cache;
pub mod crypto;
pub mod domain;
pub mod engine;
pub mod error;
pub mod llm;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod stream;
pub mod tools;
pub mod transport;

pub use approval::{requires_approval, ApprovalGate, CRITICAL_TOOLS, DEFAULT_APPROVAL_TIMEOUT};
pub use cache::{Cache, CacheError, InMemoryCache};
pub use domain::{
    AgentConfig, CacheEntry, ConversationTurn, EventSubscription, LocationReminder, Permissions,
    ResourceEvent, Role, ScheduledTask, SideEffectClass, StreamRegistration, SubscriptionType,
    ToolCall, ToolDefinition, ToolResult, UndoEntry, UsageEvent, WorkingMemoryEntry,
};
pub use engine::{
    compose_system_prompt, parse_embedded_calls, run_turn, EngineContext, TurnOutcome,
    MAX_TOOL_ROUNDS,
};
pub use error::AgentError;
pub use llm::{LlmClient, LlmResponse, LlmUsage, MockLlm, ToolChoiceMode};
pub use runtime::{AgentRuntimeManager, DeployError, DeployOutcome};
pub use scheduler::{Scheduler, TaskSink};
pub use store::{agent_namespace, agent_workspace_namespace, InMemoryStore, SqliteStore};
pub use stream::{MessageChunk, ToolStreamWriter};
pub use tools::{partition_and_dispatch, Tool, ToolCallContext, ToolRegistry, EXTERNAL_TOOL_PREFIX};
pub use transport::{
    split_for_transport, InboundUpdate, KeyboardButton, MessageTransport, OutboundMessage,
    MAX_MESSAGE_CHARS,
};
