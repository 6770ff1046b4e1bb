//! Builds an [`AgentWiring`] from a stored [`AgentConfig`]: resolves the
//! message transport, the LLM client, and the default tool registry. Real
//! provider adapters (OpenAI, Anthropic, ...) are out of scope (spec.md §1
//! Non-goals) — `"mock"` is the only provider name this binary can deploy,
//! which is enough to exercise the full runtime end to end.

use std::sync::Arc;

use optimaizer_core::runtime::AgentWiring;
use optimaizer_core::tools::builtin::{
    CalendarBackend, CalendarEvent, CancelReminder, CreateCalendarEvent, CreateNote, DeleteNote,
    FetchWebpage, ListMemories, Recall, Remember, RunCode, RunTerminalCommand, SearchNotes,
    SearchResult, SendTelegramMessage, SetReminder, UndoLast, WebClient, WebSearch,
};
use optimaizer_core::store::Store;
use optimaizer_core::{AgentConfig, ApprovalGate, MockLlm, ToolRegistry};
use optimaizer_telegram::TelegramTransport;

const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
const TELEGRAM_CHAT_ID_ENV: &str = "TELEGRAM_AUTHORIZED_CHAT_ID";
const CREDENTIALS_KEY_ENV: &str = "AGENT_CREDENTIALS_ENCRYPTION_KEY";

/// A calendar backend that only ever reports "not configured" — lets
/// `CreateCalendarEvent` stay registered (so the model sees the tool and the
/// permission gate still applies) without this binary depending on a real
/// calendar SDK, which spec.md §1 puts out of scope.
struct UnconfiguredCalendar;

#[async_trait::async_trait]
impl CalendarBackend for UnconfiguredCalendar {
    fn backend_name(&self) -> &str {
        "unconfigured"
    }

    async fn create_event(
        &self,
        _event: &CalendarEvent,
    ) -> Result<String, optimaizer_core::AgentError> {
        Err(optimaizer_core::AgentError::ExternalError(
            "no calendar backend is configured for this deployment".to_string(),
        ))
    }
}

/// A web client that always reports "not configured" — mirrors
/// `UnconfiguredCalendar`: keeps `web_search`/`fetch_webpage` registered so
/// the permission gate still applies, without this binary depending on a
/// real search API or HTTP fetcher, which spec.md §1 puts out of scope.
struct UnconfiguredWebClient;

#[async_trait::async_trait]
impl WebClient for UnconfiguredWebClient {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, optimaizer_core::AgentError> {
        Err(optimaizer_core::AgentError::ExternalError(
            "no web search backend is configured for this deployment".to_string(),
        ))
    }

    async fn fetch(&self, _url: &str) -> Result<String, optimaizer_core::AgentError> {
        Err(optimaizer_core::AgentError::ExternalError(
            "no web fetch backend is configured for this deployment".to_string(),
        ))
    }
}

/// Resolves the transport for `config`'s `integrations`. Only `"telegram"`
/// is implemented; an agent that lists any other integration name fails to
/// wire (caller turns that into a per-agent `auto_start_always_on` failure
/// rather than aborting the whole fleet).
fn build_transport(config: &AgentConfig) -> Result<Arc<dyn optimaizer_core::MessageTransport>, String> {
    if !config.integrations.iter().any(|i| i == "telegram") {
        return Err(format!(
            "agent {} has no supported messaging integration",
            config.id
        ));
    }

    let token = std::env::var(TELEGRAM_TOKEN_ENV)
        .map_err(|_| format!("{TELEGRAM_TOKEN_ENV} is not set"))?;
    let token = match std::env::var(CREDENTIALS_KEY_ENV) {
        Ok(secret) => optimaizer_core::crypto::decrypt(&token, &secret)
            .map_err(|e| format!("failed to decrypt {TELEGRAM_TOKEN_ENV}: {e}"))?,
        Err(_) => token,
    };
    let chat_id: i64 = std::env::var(TELEGRAM_CHAT_ID_ENV)
        .map_err(|_| format!("{TELEGRAM_CHAT_ID_ENV} is not set"))?
        .parse()
        .map_err(|_| format!("{TELEGRAM_CHAT_ID_ENV} is not a valid chat id"))?;

    Ok(Arc::new(TelegramTransport::new(token, chat_id)))
}

fn build_llm(config: &AgentConfig) -> Result<Arc<dyn optimaizer_core::LlmClient>, String> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockLlm::fixed(
            "this deployment has no real model provider configured",
        ))),
        other => Err(format!("unsupported provider: {other}")),
    }
}

/// Every built-in tool (spec.md §2 "Tool Registry"), registered regardless
/// of `config.permissions` — the permission gate in
/// [`optimaizer_core::approval`] decides at call time whether a given tool
/// invocation is allowed, not whether it's listed.
fn build_registry(transport: Arc<dyn optimaizer_core::MessageTransport>, config: &AgentConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(RunCode));
    registry.register(Arc::new(Remember));
    registry.register(Arc::new(Recall));
    registry.register(Arc::new(ListMemories));
    registry.register(Arc::new(CreateNote));
    registry.register(Arc::new(SearchNotes));
    registry.register(Arc::new(DeleteNote));
    registry.register(Arc::new(SetReminder));
    registry.register(Arc::new(CancelReminder));
    registry.register(Arc::new(RunTerminalCommand));
    registry.register(Arc::new(UndoLast));
    registry.register(Arc::new(CreateCalendarEvent::new(Arc::new(
        UnconfiguredCalendar,
    ))));
    let web_client: Arc<dyn WebClient> = Arc::new(UnconfiguredWebClient);
    registry.register(Arc::new(WebSearch::new(web_client.clone())));
    registry.register(Arc::new(FetchWebpage::new(web_client)));

    if config.integrations.iter().any(|i| i == "telegram") {
        registry.register(Arc::new(SendTelegramMessage::new(
            transport.clone(),
            std::env::var(TELEGRAM_CHAT_ID_ENV).unwrap_or_default(),
        )));
    }

    registry
}

/// Constructs the full [`AgentWiring`] for `config`, the closure
/// [`optimaizer_core::runtime::AgentRuntimeManager::auto_start_always_on`]
/// and the `deploy` CLI path both need.
pub fn build_wiring(config: AgentConfig, store: Arc<dyn Store>) -> Result<AgentWiring, String> {
    let transport = build_transport(&config)?;
    let llm = build_llm(&config)?;
    let registry = Arc::new(build_registry(transport.clone(), &config));

    Ok(AgentWiring {
        config,
        transport,
        llm,
        registry,
        store,
        approval_gate: Arc::new(ApprovalGate::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimaizer_core::store::InMemoryStore;
    use optimaizer_core::Permissions;

    fn test_config(provider: &str, integrations: Vec<String>) -> AgentConfig {
        AgentConfig {
            id: "a1".into(),
            owner_user_id: "u1".into(),
            name: "test".into(),
            provider: provider.into(),
            model: "mock".into(),
            system_prompt: "be helpful".into(),
            timezone: "UTC".into(),
            permissions: Permissions::default(),
            integrations,
            always_on: false,
        }
    }

    #[test]
    fn missing_integration_fails_to_wire() {
        let config = test_config("mock", vec![]);
        let result = build_wiring(config, Arc::new(InMemoryStore::new()));
        assert!(result.is_err());
    }

    /// Exercises the success path, the unsupported-provider path, and the
    /// tool-registry size in one test so only one test function touches the
    /// process-global `TELEGRAM_*` env vars (tests in this binary run
    /// concurrently by default).
    #[test]
    fn telegram_env_dependent_wiring_paths() {
        std::env::set_var("TELEGRAM_BOT_TOKEN", "test-token");
        std::env::set_var("TELEGRAM_AUTHORIZED_CHAT_ID", "42");

        let ok = build_wiring(
            test_config("mock", vec!["telegram".into()]),
            Arc::new(InMemoryStore::new()),
        );
        let unsupported_provider = build_wiring(
            test_config("openai", vec!["telegram".into()]),
            Arc::new(InMemoryStore::new()),
        );

        std::env::remove_var("TELEGRAM_BOT_TOKEN");
        std::env::remove_var("TELEGRAM_AUTHORIZED_CHAT_ID");

        let wiring = ok.unwrap();
        assert_eq!(wiring.registry.definitions().len(), 15);
        assert!(unsupported_provider.is_err());
    }
}
