use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{id, originalTool, originalParams, inverseAction?, timestamp}`. Stack per
/// agent, bounded length; `inverseAction = None` means non-reversible.
/// `inverse_action` carries the tool name and params to re-dispatch in order
/// to undo the original effect (spec.md §3, §8 round-trip law:
/// `create_note` followed by its recorded inverse leaves the note store
/// equal to its prior state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoEntry {
    pub id: String,
    pub original_tool: String,
    pub original_params: Value,
    #[serde(default)]
    pub inverse_action: Option<InverseAction>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverseAction {
    pub tool: String,
    pub params: Value,
}

impl UndoEntry {
    pub fn is_reversible(&self) -> bool {
        self.inverse_action.is_some()
    }
}

/// Per-agent undo stack, bounded in length; pushing past `max_len` drops the
/// oldest entry.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    entries: Vec<UndoEntry>,
    max_len: usize,
}

impl UndoStack {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_len,
        }
    }

    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.max_len {
            self.entries.remove(0);
        }
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
