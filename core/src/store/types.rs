//! Keyed Store port: durable key/value with JSON values, prefix scans, and
//! atomic multi-write. Every other subsystem (notes, schedules, undo stack,
//! working memory, credentials) is built on top of this trait.

use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A namespace is an ordered path segment list, e.g. `["user:42", "agent:7", "notes"]`.
/// Namespaces compose into the `user:<userId>:agent:<agentId>:<collection>` key layout.
pub type Namespace = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub namespace: Namespace,
    pub key: String,
    pub value: serde_json::Value,
    #[serde(with = "time_millis")]
    pub created_at: SystemTime,
    #[serde(with = "time_millis")]
    pub updated_at: SystemTime,
}

impl Item {
    pub fn with_timestamps(
        namespace: Namespace,
        key: String,
        value: serde_json::Value,
        created_at: SystemTime,
        updated_at: SystemTime,
    ) -> Self {
        Self {
            namespace,
            key,
            value,
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub item: Item,
    pub score: Option<f64>,
}

impl SearchItem {
    pub fn from_item(item: Item) -> Self {
        Self { item, score: None }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSearchHit {
    pub key: String,
    pub value: serde_json::Value,
    pub score: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum FilterOp {
    Eq(serde_json::Value),
    Ne(serde_json::Value),
    Gt(serde_json::Value),
    Gte(serde_json::Value),
    Lt(serde_json::Value),
    Lte(serde_json::Value),
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: Option<String>,
    pub filter: Option<Vec<(String, FilterOp)>>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self {
            query: None,
            filter: None,
            limit: 10,
            offset: 0,
        }
    }

    pub fn with_query(mut self, q: impl Into<String>) -> Self {
        self.query = Some(q.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceMatchType {
    Prefix,
    Suffix,
}

#[derive(Debug, Clone)]
pub struct MatchCondition {
    pub match_type: NamespaceMatchType,
    pub path: Namespace,
}

impl MatchCondition {
    pub fn prefix(path: Namespace) -> Self {
        Self {
            match_type: NamespaceMatchType::Prefix,
            path,
        }
    }

    pub fn suffix(path: Namespace) -> Self {
        Self {
            match_type: NamespaceMatchType::Suffix,
            path,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListNamespacesOptions {
    pub match_conditions: Vec<MatchCondition>,
    pub max_depth: Option<usize>,
    pub limit: usize,
    pub offset: usize,
}

impl ListNamespacesOptions {
    pub fn new() -> Self {
        Self {
            match_conditions: Vec::new(),
            max_depth: None,
            limit: usize::MAX,
            offset: 0,
        }
    }

    pub fn with_prefix(mut self, path: Namespace) -> Self {
        self.match_conditions.push(MatchCondition {
            match_type: NamespaceMatchType::Prefix,
            path,
        });
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_suffix(mut self, path: Namespace) -> Self {
        self.match_conditions.push(MatchCondition::suffix(path));
        self
    }
}

/// A single operation inside an atomic [`Store::batch`] call.
#[derive(Debug, Clone)]
pub enum StoreOp {
    Get {
        namespace: Namespace,
        key: String,
    },
    /// `value: None` deletes the key.
    Put {
        namespace: Namespace,
        key: String,
        value: Option<serde_json::Value>,
    },
    Search {
        namespace_prefix: Namespace,
        options: SearchOptions,
    },
    ListNamespaces {
        options: ListNamespacesOptions,
    },
}

#[derive(Debug, Clone)]
pub enum StoreOpResult {
    Get(Option<Item>),
    Put,
    Search(Vec<SearchItem>),
    ListNamespaces(Vec<Namespace>),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Durable key/value store with JSON values, prefix scans over namespaces, and
/// atomic multi-write via [`Store::batch`]. Every user-visible entity (notes,
/// schedules, undo stack, working memory) is scoped under a `(userId, agentId)`
/// namespace prefix and goes through this port.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    async fn get_item(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, StoreError>;

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError>;

    async fn list(&self, namespace: &Namespace) -> Result<Vec<String>, StoreError>;

    async fn search(
        &self,
        namespace_prefix: &Namespace,
        options: SearchOptions,
    ) -> Result<Vec<SearchItem>, StoreError>;

    async fn list_namespaces(
        &self,
        options: ListNamespacesOptions,
    ) -> Result<Vec<Namespace>, StoreError>;

    /// Executes a sequence of operations atomically (all-or-nothing from the
    /// caller's perspective — concurrent readers never observe a partial batch).
    async fn batch(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreOpResult>, StoreError>;

    async fn search_simple(
        &self,
        namespace: &Namespace,
        query: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreSearchHit>, StoreError> {
        let options = SearchOptions {
            query: query.map(String::from),
            filter: None,
            limit: limit.unwrap_or(10),
            offset: 0,
        };
        let results = self.search(namespace, options).await?;
        Ok(results
            .into_iter()
            .map(|si| StoreSearchHit {
                key: si.item.key,
                value: si.item.value,
                score: si.score,
            })
            .collect())
    }
}

mod time_millis {
    use std::time::{SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let millis = t
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        s.serialize_i64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let millis = i64::deserialize(d)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_millis(millis.max(0) as u64))
    }
}
