//! Stable cache key for the response cache (spec.md §4.4): a hash over
//! `(route, provider, model, normalized messages, systemPrompt, params,
//! tooling, extras)`. Two requests that would produce the same provider
//! call hash to the same key regardless of field ordering in the request
//! JSON, since we hash the already-parsed, canonicalized fields rather than
//! raw text.
//!
//! Uses `DefaultHasher` rather than a cryptographic digest: this key never
//! leaves the process (the cache is in-memory, spec.md §3 "no shared
//! mutable state across agents other than the streaming registry and the
//! response cache") and collision resistance across restarts is not
//! required — only stability within one process lifetime.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use optimaizer_core::domain::ConversationTurn;

#[derive(Hash)]
struct CacheKeyInput<'a> {
    route: &'a str,
    provider: &'a str,
    model: &'a str,
    system_prompt: &'a str,
    history: Vec<(&'static str, &'a str)>,
    tool_choice: &'a str,
    extras: &'a str,
}

/// Builds the stable cache key for one provider invocation.
pub fn compute_cache_key(
    route: &str,
    provider: &str,
    model: &str,
    system_prompt: &str,
    history: &[ConversationTurn],
    tool_choice: &str,
    extras: &str,
) -> String {
    let history = history
        .iter()
        .map(|turn| (role_tag(turn), turn.content.as_str()))
        .collect();

    let input = CacheKeyInput {
        route,
        provider,
        model,
        system_prompt,
        history,
        tool_choice,
        extras,
    };

    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn role_tag(turn: &ConversationTurn) -> &'static str {
    use optimaizer_core::Role;
    match turn.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimaizer_core::domain::ConversationTurn;

    #[test]
    fn identical_inputs_hash_identically() {
        let history = vec![ConversationTurn::user("hi")];
        let a = compute_cache_key("chat", "openai", "gpt", "sys", &history, "auto", "");
        let b = compute_cache_key("chat", "openai", "gpt", "sys", &history, "auto", "");
        assert_eq!(a, b);
    }

    #[test]
    fn different_system_prompts_hash_differently() {
        let history = vec![ConversationTurn::user("hi")];
        let a = compute_cache_key("chat", "openai", "gpt", "sys a", &history, "auto", "");
        let b = compute_cache_key("chat", "openai", "gpt", "sys b", &history, "auto", "");
        assert_ne!(a, b);
    }

    #[test]
    fn different_routes_hash_differently_for_the_same_messages() {
        let history = vec![ConversationTurn::user("hi")];
        let chat = compute_cache_key("chat", "openai", "gpt", "sys", &history, "auto", "");
        let summarize = compute_cache_key("summarize", "openai", "gpt", "sys", &history, "auto", "");
        assert_ne!(chat, summarize);
    }
}
