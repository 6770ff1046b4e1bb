//! Agent Runtime Manager (spec.md §4.1): owns the in-memory set of deployed
//! agents keyed by `agentId`. Each deployment spawns a message-poll task, a
//! scheduler task, and an on-demand turn executor that the poll task drives
//! one stimulus at a time; every task observes a per-agent
//! [`CancellationToken`] at its suspension points so `stop`/`stop_all` are
//! cooperative rather than forced.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::approval::ApprovalGate;
use crate::domain::{AgentConfig, ConversationTurn, WorkingMemoryEntry};
use crate::engine::{compose_system_prompt, run_turn, EngineContext};
use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::scheduler::{Scheduler, TaskSink, DEFAULT_TICK_INTERVAL};
use crate::store::{agent_namespace, agent_workspace_namespace, Store};
use crate::tools::{ToolCallContext, ToolRegistry};
use crate::transport::{split_for_transport, InboundUpdate, MessageTransport, OutboundMessage};

/// Bound on the per-agent inbound message queue (spec.md §5 "Backpressure":
/// bounded, FIFO, drop-oldest on overflow).
const MESSAGE_QUEUE_CAPACITY: usize = 64;

/// How long `stop`/`stop_all` wait for a deployment's tasks to observe
/// cancellation and return before giving up on a graceful join.
const DRAIN_WINDOW: Duration = Duration::from_secs(5);

/// Bounded FIFO queue of inbound updates for one agent. A plain
/// `mpsc::channel` rejects (drops) whatever is being *sent* once full, which
/// is drop-newest; spec.md §5 Backpressure requires the opposite — "overflow
/// drops oldest with a warning" — so the newest update must always be
/// admitted and the queue's own front popped to make room for it instead.
struct InboundQueue {
    capacity: usize,
    items: Mutex<VecDeque<InboundUpdate>>,
    notify: Notify,
}

impl InboundQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
        }
    }

    /// Enqueues `update`, evicting the oldest queued item first if the queue
    /// is already at capacity.
    async fn push(&self, update: InboundUpdate) {
        let mut items = self.items.lock().await;
        if items.len() >= self.capacity {
            if let Some(dropped) = items.pop_front() {
                warn!(chat_id = %dropped.chat_id(), "inbound queue full, dropping oldest");
            }
        }
        items.push_back(update);
        drop(items);
        self.notify.notify_one();
    }

    /// Waits for and pops the oldest queued update.
    async fn pop(&self) -> InboundUpdate {
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(update) = items.pop_front() {
                    return update;
                }
            }
            self.notify.notified().await;
        }
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("agent {0} is alwaysOn but has no messaging credentials")]
    MissingCredentials(String),
}

/// Result of one [`AgentRuntimeManager::auto_start_always_on`] pass: which
/// agents deployed and which failed, so one bad config never blocks the
/// rest (spec.md §7 "a failed deploy for one agent never prevents the rest
/// from deploying").
#[derive(Debug, Default)]
pub struct DeployOutcome {
    pub deployed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Everything one deployed agent needs wired in: the collaborators the
/// engine composes (spec.md §2) plus the agent's own config and system
/// prompt. Built by whatever embeds this crate (the `optimaizer-runtime`
/// binary) once per agent, from decrypted credentials and a constructed
/// provider adapter/transport.
pub struct AgentWiring {
    pub config: AgentConfig,
    pub transport: Arc<dyn MessageTransport>,
    pub llm: Arc<dyn LlmClient>,
    pub registry: Arc<ToolRegistry>,
    pub store: Arc<dyn Store>,
    pub approval_gate: Arc<ApprovalGate>,
}

struct RunningAgent {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Owns every live agent's workers. A single process hosts one manager;
/// `deploy`/`stop` mutate its table under a lock so concurrent deploys of
/// different agents never race each other's bookkeeping.
#[derive(Default)]
pub struct AgentRuntimeManager {
    running: Mutex<HashMap<String, RunningAgent>>,
}

impl AgentRuntimeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts message polling, the scheduler tick loop, and the
    /// conversation history for `wiring.config`. Idempotent: deploying an
    /// agent id that is already running stops the old deployment cleanly
    /// first (spec.md §4.1 "re-deploying replaces the existing runtime
    /// cleanly").
    pub async fn deploy(&self, wiring: AgentWiring) -> Result<(), DeployError> {
        let has_credentials = !wiring.config.integrations.is_empty();
        wiring
            .config
            .validate_always_on(has_credentials)
            .map_err(|_| DeployError::MissingCredentials(wiring.config.id.clone()))?;

        self.stop(&wiring.config.id).await;

        let cancel = CancellationToken::new();
        let agent_id = wiring.config.id.clone();
        let user_id = wiring.config.owner_user_id.clone();

        let history: Arc<Mutex<Vec<ConversationTurn>>> = Arc::new(Mutex::new(Vec::new()));

        let queue = Arc::new(InboundQueue::new(MESSAGE_QUEUE_CAPACITY));

        let scheduler_sink = Arc::new(EngineTaskSink {
            user_id: user_id.clone(),
            agent_id: agent_id.clone(),
            config: Arc::new(wiring.config.clone()),
            transport: wiring.transport.clone(),
            llm: wiring.llm.clone(),
            registry: wiring.registry.clone(),
            approval_gate: wiring.approval_gate.clone(),
            store: wiring.store.clone(),
            history: history.clone(),
        });

        let scheduler = Scheduler::new(wiring.store.clone(), scheduler_sink.clone());
        let scheduler_cancel = cancel.clone();
        let scheduler_task = tokio::spawn(async move {
            scheduler.run(DEFAULT_TICK_INTERVAL, scheduler_cancel).await;
        });

        let poll_transport = wiring.transport.clone();
        let poll_cancel = cancel.clone();
        let poll_queue = queue.clone();
        let poll_task = tokio::spawn(async move {
            run_message_poll_loop(poll_transport, poll_queue, poll_cancel).await;
        });

        let dispatch_sink = scheduler_sink;
        let dispatch_cancel = cancel.clone();
        let dispatch_task = tokio::spawn(async move {
            run_message_dispatch_loop(queue, dispatch_sink, dispatch_cancel).await;
        });

        let mut running = self.running.lock().await;
        running.insert(
            agent_id,
            RunningAgent {
                cancel,
                tasks: vec![scheduler_task, poll_task, dispatch_task],
            },
        );
        Ok(())
    }

    /// Signals cancellation and waits up to [`DRAIN_WINDOW`] for every task
    /// to observe it and return. Returns `false` if the agent wasn't
    /// running.
    pub async fn stop(&self, agent_id: &str) -> bool {
        let entry = self.running.lock().await.remove(agent_id);
        let Some(running) = entry else {
            return false;
        };
        running.cancel.cancel();
        let drain = tokio::time::timeout(DRAIN_WINDOW, futures::future::join_all(running.tasks));
        if drain.await.is_err() {
            warn!(agent_id, "agent did not drain within the shutdown window");
        }
        true
    }

    /// Stops every running agent; used on process shutdown. Each agent's
    /// drain runs concurrently so the total wait is bounded by
    /// [`DRAIN_WINDOW`], not the sum across agents.
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.running.lock().await.keys().cloned().collect();
        let stops = ids.iter().map(|id| self.stop(id));
        futures::future::join_all(stops).await;
    }

    pub async fn list_running(&self) -> Vec<String> {
        self.running.lock().await.keys().cloned().collect()
    }

    /// Scans every user's `agentWorkspace` for `alwaysOn` configs and
    /// deploys each, isolating failures per agent (spec.md §4.1).
    /// `build_wiring` constructs the per-agent collaborators (decrypting
    /// credentials, instantiating the provider adapter and transport) —
    /// this crate has no opinion on how that's done.
    pub async fn auto_start_always_on<F>(
        &self,
        store: &dyn Store,
        user_ids: &[String],
        build_wiring: F,
    ) -> DeployOutcome
    where
        F: Fn(AgentConfig) -> Result<AgentWiring, String>,
    {
        let mut outcome = DeployOutcome::default();
        for user_id in user_ids {
            let namespace = agent_workspace_namespace(user_id);
            let keys = match store.list(&namespace).await {
                Ok(keys) => keys,
                Err(e) => {
                    error!(user_id, error = %e, "failed to list agent workspace");
                    continue;
                }
            };
            for key in keys {
                let Ok(Some(raw)) = store.get(&namespace, &key).await else {
                    continue;
                };
                let Ok(config) = serde_json::from_value::<AgentConfig>(raw) else {
                    continue;
                };
                if !config.always_on {
                    continue;
                }
                let agent_id = config.id.clone();
                let wiring = match build_wiring(config) {
                    Ok(w) => w,
                    Err(e) => {
                        outcome.failed.push((agent_id, e));
                        continue;
                    }
                };
                match self.deploy(wiring).await {
                    Ok(()) => {
                        info!(agent_id, "auto-started always-on agent");
                        outcome.deployed.push(agent_id);
                    }
                    Err(e) => outcome.failed.push((agent_id, e.to_string())),
                }
            }
        }
        outcome
    }
}

/// Long-polls `transport` until `cancel` fires, forwarding each update into
/// the bounded dispatch queue. Overflow drops the oldest queued update with
/// a warning rather than blocking the poll loop (spec.md §5 Backpressure).
async fn run_message_poll_loop(
    transport: Arc<dyn MessageTransport>,
    queue: Arc<InboundQueue>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let updates = tokio::select! {
            _ = cancel.cancelled() => return,
            result = transport.poll_updates() => result,
        };
        match updates {
            Ok(updates) => {
                for update in updates {
                    queue.push(update).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "message poll failed, retrying");
            }
        }
    }
}

/// Drains the dispatch queue one stimulus at a time (spec.md §5 "one turn at
/// a time... processed FIFO"), running a full turn per update and replying
/// through the transport.
async fn run_message_dispatch_loop(
    queue: Arc<InboundQueue>,
    sink: Arc<EngineTaskSink>,
    cancel: CancellationToken,
) {
    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => return,
            update = queue.pop() => update,
        };
        if let Err(e) = sink.handle_update(update).await {
            error!(error = %e, "turn failed for inbound update");
        }
    }
}

/// Bridges the scheduler's `fire` calls and inbound transport updates into
/// `run_turn` calls, then forwards the resulting assistant text back through
/// the transport (spec.md §4.3 "the Engine treats it as a conversation turn
/// and typically responds by sending the reply through the Message
/// Transport").
struct EngineTaskSink {
    user_id: String,
    agent_id: String,
    config: Arc<AgentConfig>,
    transport: Arc<dyn MessageTransport>,
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    approval_gate: Arc<ApprovalGate>,
    store: Arc<dyn Store>,
    history: Arc<Mutex<Vec<ConversationTurn>>>,
}

impl EngineTaskSink {
    async fn run_and_reply(&self, stimulus: ConversationTurn, chat_id: &str) -> Result<(), AgentError> {
        let tool_ctx = ToolCallContext::new(&self.user_id, &self.agent_id)
            .with_store(self.store.clone())
            .with_permissions(self.config.permissions.clone());
        let gate = self.approval_gate.as_ref();
        let working_memory = self.load_working_memory_snapshot().await;
        let system_prompt = compose_system_prompt(&self.config.system_prompt, &working_memory);
        let ectx = EngineContext::new(
            self.llm.as_ref(),
            self.registry.as_ref(),
            gate,
            &tool_ctx,
            &system_prompt,
        )
        .with_usage_tagging(self.config.provider.clone(), self.config.model.clone());

        let mut history = self.history.lock().await;
        let outcome = run_turn(&history, stimulus.clone(), &ectx).await?;
        history.push(stimulus);
        history.extend(outcome.new_turns.clone());
        drop(history);

        if let Some(last) = outcome.new_turns.iter().rev().find(|t| !t.content.is_empty()) {
            for chunk in split_for_transport(&last.content) {
                self.transport
                    .send_message(&OutboundMessage::text(chat_id, chunk))
                    .await?;
            }
        }
        Ok(())
    }

    /// Loads this agent's working-memory collection for injection into the
    /// turn's system prompt (spec.md §4.2 step 1). Store errors or malformed
    /// rows are skipped rather than failing the turn — a missing snapshot is
    /// harmless, an aborted reminder/reply is not.
    async fn load_working_memory_snapshot(&self) -> Vec<WorkingMemoryEntry> {
        let namespace = agent_namespace(&self.user_id, &self.agent_id, "workingMemory");
        let Ok(keys) = self.store.list(&namespace).await else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        for key in keys {
            if let Ok(Some(raw)) = self.store.get(&namespace, &key).await {
                if let Ok(entry) = serde_json::from_value::<WorkingMemoryEntry>(raw) {
                    entries.push(entry);
                }
            }
        }
        entries
    }

    async fn handle_update(&self, update: InboundUpdate) -> Result<(), AgentError> {
        let chat_id = update.chat_id().to_string();
        let stimulus = match &update {
            InboundUpdate::Message { text, .. } => {
                self.maybe_fire_keyword_subscriptions(text).await;
                ConversationTurn::user(text.clone())
            }
            InboundUpdate::ButtonCallback { callback_data, .. } => {
                ConversationTurn::user(format!("[BUTTON] {callback_data}"))
            }
            InboundUpdate::File { file_id, .. } => ConversationTurn::user(format!("[FILE] {file_id}")),
            InboundUpdate::Location { lat, lon, .. } => {
                self.maybe_fire_location_reminders(*lat, *lon).await;
                ConversationTurn::user(format!("[LOCATION] {lat},{lon}"))
            }
        };
        self.run_and_reply(stimulus, &chat_id).await
    }

    async fn maybe_fire_location_reminders(&self, lat: f64, lon: f64) {
        let namespace = agent_namespace(&self.user_id, &self.agent_id, "locations");
        let Ok(keys) = self.store.list(&namespace).await else {
            return;
        };
        for key in keys {
            let Ok(Some(raw)) = self.store.get(&namespace, &key).await else {
                continue;
            };
            let Ok(mut reminder) =
                serde_json::from_value::<crate::domain::LocationReminder>(raw)
            else {
                continue;
            };
            let now = chrono::Utc::now();
            if crate::scheduler::due_location_reminders(
                std::slice::from_ref(&reminder),
                lat,
                lon,
                now,
            )
            .is_empty()
            {
                continue;
            }
            reminder.last_triggered = Some(now);
            if let Ok(value) = serde_json::to_value(&reminder) {
                let _ = self.store.put(&namespace, &key, &value).await;
            }
            if let Err(e) = self.fire(&self.owner_scope(), &reminder.message).await {
                warn!(error = %e, reminder = %reminder.id, "location reminder fire failed");
            }
        }
    }

    /// Reactive fire path for `keyword`-type subscriptions (spec.md §4.3):
    /// every inbound message is checked against each such subscription's
    /// pattern, independent of the conversation turn the message also
    /// drives. Mirrors [`Self::maybe_fire_location_reminders`]'s direct
    /// store-scan shape rather than routing through a shared `Scheduler`
    /// instance, since this sink has no handle back onto the tick-loop
    /// scheduler it was itself constructed as the `TaskSink` for.
    async fn maybe_fire_keyword_subscriptions(&self, text: &str) {
        let namespace = agent_namespace(&self.user_id, &self.agent_id, crate::scheduler::SUBSCRIPTIONS_COLLECTION);
        let Ok(keys) = self.store.list(&namespace).await else {
            return;
        };
        let lower_text = text.to_lowercase();
        for key in keys {
            let Ok(Some(raw)) = self.store.get(&namespace, &key).await else {
                continue;
            };
            let Ok(mut sub) = serde_json::from_value::<crate::domain::EventSubscription>(raw) else {
                continue;
            };
            let now = chrono::Utc::now();
            if sub.kind != crate::domain::SubscriptionType::Keyword || !sub.can_fire(now) {
                continue;
            }
            if sub.pattern.is_empty() || !lower_text.contains(&sub.pattern.to_lowercase()) {
                continue;
            }

            sub.record_fire(now);
            if let Ok(value) = serde_json::to_value(&sub) {
                let _ = self.store.put(&namespace, &key, &value).await;
            }
            if let Err(e) = self.fire(&self.owner_scope(), &sub.instruction).await {
                warn!(error = %e, subscription = %sub.id, "keyword subscription fire failed");
            }
        }
    }

    fn owner_scope(&self) -> String {
        format!("user:{}:agent:{}", self.user_id, self.agent_id)
    }
}

#[async_trait]
impl TaskSink for EngineTaskSink {
    /// Synthesizes a `[REMINDER]`/`[TRIGGER]` stimulus (spec.md §4.3) and
    /// runs it as a conversation turn. The owning chat id for a reply is
    /// resolved from the agent's own integrations; this crate has no
    /// concrete transport binding to a chat, so it replies to the
    /// transport's configured default chat.
    async fn fire(&self, _owner_scope: &str, instruction: &str) -> Result<(), AgentError> {
        let stimulus = ConversationTurn::user(format!("[REMINDER] {instruction}"));
        self.run_and_reply(stimulus, &self.agent_id).await
    }
}
