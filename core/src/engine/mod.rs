//! Conversation & Tool-Dispatch Engine (spec.md §4.2): the turn loop that
//! ties together an [`crate::llm::LlmClient`], the [`crate::tools`] registry,
//! and the [`crate::approval`] gate into one request-response cycle per
//! stimulus (user message, scheduler fire, webhook).
//!
//! A direct, non-graph reimplementation of the teacher's Think→Act→Observe
//! cycle — the teacher spreads that loop across a `graph`/`runner_common`
//! state machine; spec.md has no use for resumable multi-step plans, so it
//! collapses into one `run_turn` async function that loops over provider
//! rounds until the model stops asking for tools.

mod parser;

pub use parser::parse_embedded_calls;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::approval::{requires_approval, ApprovalGate, DEFAULT_APPROVAL_TIMEOUT};
use crate::domain::{ConversationTurn, ResourceEvent, ToolCall, ToolResult, UsageEvent, WorkingMemoryEntry};
use crate::error::AgentError;
use crate::llm::{LlmClient, LlmRequest, LlmUsage, ToolChoiceMode};
use crate::stream::MessageChunk;
use crate::tools::{partition_and_dispatch, ToolCallContext, ToolRegistry};

/// Upper bound on provider round-trips within a single `run_turn` call
/// (spec.md §4.2 step 8 "a bounded number of rounds; exceeding it forces a
/// final text-only round rather than looping forever").
pub const MAX_TOOL_ROUNDS: u32 = 8;

/// Everything `run_turn` needs beyond the conversation history and the new
/// stimulus: the collaborators it's wired against for this agent.
pub struct EngineContext<'a> {
    pub llm: &'a dyn LlmClient,
    pub registry: &'a ToolRegistry,
    pub approval_gate: &'a ApprovalGate,
    pub tool_ctx: &'a ToolCallContext,
    pub system_prompt: &'a str,
    /// Forwards provider tokens as they arrive; `None` for internal stimuli
    /// that don't need live streaming (spec.md §4.2 step 1).
    pub chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    pub cancel: CancellationToken,
    pub approval_timeout: Duration,
    /// Tags persisted [`UsageEvent`]s (spec.md §6 `user_usage_events`); empty
    /// by default since most call sites (tests, internal stimuli without a
    /// configured store) never persist anything.
    pub provider: String,
    pub model: String,
}

impl<'a> EngineContext<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        registry: &'a ToolRegistry,
        approval_gate: &'a ApprovalGate,
        tool_ctx: &'a ToolCallContext,
        system_prompt: &'a str,
    ) -> Self {
        Self {
            llm,
            registry,
            approval_gate,
            tool_ctx,
            system_prompt,
            chunk_tx: None,
            cancel: CancellationToken::new(),
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            provider: String::new(),
            model: String::new(),
        }
    }

    pub fn with_chunk_tx(mut self, tx: mpsc::Sender<MessageChunk>) -> Self {
        self.chunk_tx = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Tags usage events persisted for this turn with the provider/model
    /// that served it (spec.md §3 `AgentConfig.provider`/`.model`).
    pub fn with_usage_tagging(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = provider.into();
        self.model = model.into();
        self
    }
}

/// Appends a working-memory snapshot to `base_prompt` (spec.md §4.2 step 1
/// "system prompt + dynamically injected context (... working memory
/// snapshot ...)"). Entries are rendered `label: content`, one per line, in
/// the order the store returned them; an empty snapshot leaves the prompt
/// unchanged so agents with no working memory yet see an identical prompt
/// to before this context was added.
pub fn compose_system_prompt(base_prompt: &str, working_memory: &[WorkingMemoryEntry]) -> String {
    if working_memory.is_empty() {
        return base_prompt.to_string();
    }
    let mut prompt = base_prompt.to_string();
    prompt.push_str("\n\n# Working memory\n");
    for entry in working_memory {
        prompt.push_str(&format!("- {}: {}\n", entry.label, entry.content));
    }
    prompt
}

/// Outcome of one `run_turn` call: the new turns to append to the
/// conversation (assistant + tool-result turns, in order) and the running
/// token usage across every provider round this turn made.
pub struct TurnOutcome {
    pub new_turns: Vec<ConversationTurn>,
    pub usage: LlmUsage,
}

/// Runs one full turn: composes a request from `history` plus the new
/// `stimulus` turn, invokes the provider, dispatches any tool calls
/// (native-first, falling back to envelope-parsed calls in the response text
/// when the provider returned none natively — spec.md §9 "when both fire,
/// the native path wins and parsed text envelopes are discarded"), gates
/// critical calls through approval, and loops until the model responds with
/// no further tool calls or [`MAX_TOOL_ROUNDS`] is reached.
pub async fn run_turn(
    history: &[ConversationTurn],
    stimulus: ConversationTurn,
    ctx: &EngineContext<'_>,
) -> Result<TurnOutcome, AgentError> {
    let mut working_history: Vec<ConversationTurn> = history.to_vec();
    working_history.push(stimulus);

    let mut new_turns = Vec::new();
    let mut usage = LlmUsage::default();

    for round in 0..=MAX_TOOL_ROUNDS {
        if ctx.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let forcing_final_round = round == MAX_TOOL_ROUNDS;
        let request = LlmRequest {
            system_prompt: ctx.system_prompt.to_string(),
            history: working_history.clone(),
            tool_choice: if forcing_final_round {
                ToolChoiceMode::None
            } else {
                ToolChoiceMode::Auto
            },
        };

        let response = ctx
            .llm
            .invoke_stream(&request, ctx.chunk_tx.clone(), ctx.cancel.clone())
            .await?;

        if let Some(round_usage) = &response.usage {
            usage.prompt_tokens += round_usage.prompt_tokens;
            usage.completion_tokens += round_usage.completion_tokens;
            usage.total_tokens += round_usage.total_tokens;
        }

        // Native tool calls always win; fall back to envelope parsing only
        // when the provider returned none (spec.md §9).
        let (visible_content, tool_calls) = if response.tool_calls.is_empty() {
            parse_embedded_calls(&response.content)
        } else {
            (response.content.clone(), response.tool_calls.clone())
        };

        if tool_calls.is_empty() || forcing_final_round {
            new_turns.push(ConversationTurn::assistant(visible_content, Vec::new()));
            break;
        }

        let assistant_turn = ConversationTurn::assistant(visible_content, tool_calls.clone());
        working_history.push(assistant_turn.clone());
        new_turns.push(assistant_turn);

        let results = dispatch_with_approval(&tool_calls, ctx).await;

        let result_turn = ConversationTurn::tool_results(results);
        working_history.push(result_turn.clone());
        new_turns.push(result_turn);
    }

    record_usage_event(ctx, &usage).await;

    Ok(TurnOutcome { new_turns, usage })
}

/// Appends a [`UsageEvent`] to this agent's `usageEvents` collection
/// (spec.md §6 `user_usage_events`, append-only). Best-effort: a context
/// built without a store (most tests, and internal stimuli that never wired
/// one) silently skips accounting rather than failing the turn over it.
async fn record_usage_event(ctx: &EngineContext<'_>, usage: &LlmUsage) {
    let Some(store) = &ctx.tool_ctx.store else {
        return;
    };
    let event = UsageEvent::new(
        ctx.tool_ctx.agent_id.as_str(),
        ctx.provider.as_str(),
        ctx.model.as_str(),
        usage,
    );
    let namespace = ctx.tool_ctx.namespace("usageEvents");
    let _ = store
        .put(&namespace, &event.id, &serde_json::to_value(&event).unwrap_or_default())
        .await;
}

/// Appends a [`ResourceEvent`] to this agent's `resourceEvents` collection
/// (spec.md §6 `user_resource_events`, append-only), recording whatever
/// approval decision applied and whether the call ultimately succeeded.
/// Best-effort, same as [`record_usage_event`].
async fn record_resource_event(
    ctx: &EngineContext<'_>,
    call: &ToolCall,
    required_approval: bool,
    approved: Option<bool>,
    success: bool,
) {
    let Some(store) = &ctx.tool_ctx.store else {
        return;
    };
    let event = ResourceEvent::new(
        ctx.tool_ctx.agent_id.as_str(),
        call.name.as_str(),
        call.correlation_id.as_str(),
        required_approval,
        approved,
        success,
    );
    let namespace = ctx.tool_ctx.namespace("resourceEvents");
    let _ = store
        .put(&namespace, &event.id, &serde_json::to_value(&event).unwrap_or_default())
        .await;
}

/// Splits `calls` into the critical subset (gated through
/// [`ApprovalGate::request`] before ever reaching the registry) and the rest
/// (passed straight to [`partition_and_dispatch`]), then merges results back
/// into the calls' original order.
async fn dispatch_with_approval(calls: &[ToolCall], ctx: &EngineContext<'_>) -> Vec<ToolResult> {
    let mut slots: Vec<Option<ToolResult>> = (0..calls.len()).map(|_| None).collect();
    let mut dispatchable: Vec<(usize, ToolCall)> = Vec::new();

    let mut approvals: Vec<Option<bool>> = (0..calls.len()).map(|_| None).collect();

    for (i, call) in calls.iter().enumerate() {
        if requires_approval(&call.name) {
            let approved = ctx
                .approval_gate
                .request(&call.correlation_id, ctx.approval_timeout)
                .await;
            approvals[i] = Some(approved);
            if approved {
                dispatchable.push((i, call.clone()));
            } else {
                // Denied or timed out: synthesized directly, never reaches
                // the registry (spec.md §4.5 "no subprocess spawned").
                slots[i] = Some(ToolResult::err(call.correlation_id.clone(), "user denied"));
            }
        } else {
            dispatchable.push((i, call.clone()));
        }
    }

    if !dispatchable.is_empty() {
        let remaining_calls: Vec<ToolCall> = dispatchable.iter().map(|(_, c)| c.clone()).collect();
        let remaining_results =
            partition_and_dispatch(&remaining_calls, ctx.registry, ctx.tool_ctx).await;
        for ((i, _), result) in dispatchable.into_iter().zip(remaining_results) {
            slots[i] = Some(result);
        }
    }

    let results: Vec<ToolResult> = slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.unwrap_or_else(|| {
                ToolResult::err(calls[i].correlation_id.clone(), "tool did not run")
            })
        })
        .collect();

    for (i, call) in calls.iter().enumerate() {
        record_resource_event(
            ctx,
            call,
            requires_approval(&call.name),
            approvals[i],
            results[i].success,
        )
        .await;
    }

    results
}
