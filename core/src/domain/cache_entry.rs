use serde::{Deserialize, Serialize};

/// `{key, value, createdAt, expiresAt}`. TTL-bounded; the owning cache is
/// additionally size-bounded with oldest-first eviction (spec.md §3,
/// backing the Streaming Dispatcher's response cache — see
/// [`crate::stream_dispatch::cache`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_inclusive_of_expires_at() {
        let now = chrono::Utc::now();
        let entry = CacheEntry {
            key: "k".into(),
            value: "v".into(),
            created_at: now,
            expires_at: now + Duration::seconds(10),
        };
        assert!(!entry.is_expired(now));
        assert!(entry.is_expired(now + Duration::seconds(10)));
        assert!(entry.is_expired(now + Duration::seconds(11)));
    }
}
