//! Keyed Store (port): durable key/value with JSON values, prefix scans over
//! namespaces, and atomic multi-write. Every user-visible entity (notes,
//! schedules, subscriptions, undo stack, working memory, credentials) is
//! scoped under a `(userId, agentId)` namespace prefix and stored through
//! this port — see [`crate::domain`] for the entities themselves.

mod id;
mod in_memory;
mod sqlite;
pub mod types;

pub use id::{uuid6, uuid6_with_params, Uuid6};
pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
    FilterOp, Item, ListNamespacesOptions, MatchCondition, Namespace, NamespaceMatchType,
    SearchItem, SearchOptions, Store, StoreError, StoreOp, StoreOpResult, StoreSearchHit,
};

/// Builds the namespace prefix for a single agent's scoped collections, per
/// the persistence key layout `user:<userId>:agent:<agentId>:<collection>`.
pub fn agent_namespace(user_id: &str, agent_id: &str, collection: &str) -> Namespace {
    vec![
        format!("user:{user_id}"),
        format!("agent:{agent_id}"),
        collection.to_string(),
    ]
}

/// Builds the namespace for a user's agent workspace listing
/// (`user:<userId>:agentWorkspace`).
pub fn agent_workspace_namespace(user_id: &str) -> Namespace {
    vec![format!("user:{user_id}"), "agentWorkspace".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_namespace_matches_key_layout() {
        let ns = agent_namespace("u1", "a1", "notes");
        assert_eq!(ns, vec!["user:u1", "agent:a1", "notes"]);
    }
}
