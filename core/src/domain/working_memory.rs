use serde::{Deserialize, Serialize};

/// `{id, label, content, updatedAt}`. Labels are unique per agent; a second
/// write to the same label overwrites (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemoryEntry {
    pub id: String,
    pub label: String,
    pub content: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl WorkingMemoryEntry {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            content: content.into(),
            updated_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_gets_a_fresh_id() {
        let a = WorkingMemoryEntry::new("l", "c");
        let b = WorkingMemoryEntry::new("l", "c");
        assert_ne!(a.id, b.id);
    }
}
