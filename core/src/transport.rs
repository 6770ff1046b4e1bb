//! Message Transport (port): an inbound channel delivering user messages,
//! button callbacks, files, and location updates; an outbound channel
//! accepting chat replies, button keyboards, and file downloads (spec.md §2,
//! §6 "bot API shape"). Modeled after a long-poll bot API; the concrete
//! implementation ([`optimaizer-telegram`], outside this crate) is the only
//! thing that knows about a specific provider's wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// One row of inline-keyboard buttons is a list of `{text, callback_data}`
/// pairs; the keyboard itself is a list of rows (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
    pub callback_data: String,
}

pub type InlineKeyboard = Vec<Vec<KeyboardButton>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
    #[serde(default)]
    pub reply_markup: Option<InlineKeyboard>,
}

impl OutboundMessage {
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            reply_markup: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.reply_markup = Some(keyboard);
        self
    }
}

/// One inbound update from the transport's long-poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InboundUpdate {
    Message {
        chat_id: String,
        text: String,
    },
    ButtonCallback {
        chat_id: String,
        callback_data: String,
    },
    File {
        chat_id: String,
        file_id: String,
    },
    Location {
        chat_id: String,
        lat: f64,
        lon: f64,
    },
}

impl InboundUpdate {
    pub fn chat_id(&self) -> &str {
        match self {
            Self::Message { chat_id, .. }
            | Self::ButtonCallback { chat_id, .. }
            | Self::File { chat_id, .. }
            | Self::Location { chat_id, .. } => chat_id,
        }
    }
}

/// Port every concrete messaging backend implements. The engine depends only
/// on this trait, never on a specific bot API.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Long-polls for the next batch of updates, blocking up to the
    /// transport's own timeout (spec.md §5 "transport long-poll 25 s").
    async fn poll_updates(&self) -> Result<Vec<InboundUpdate>, AgentError>;

    async fn send_message(&self, message: &OutboundMessage) -> Result<(), AgentError>;

    /// Downloads a previously referenced file's raw bytes.
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, AgentError>;
}

/// Maximum message length before [`split_for_transport`] must split (spec.md
/// §6 "messages over 4000 characters are split").
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Splits `text` into chunks of at most [`MAX_MESSAGE_CHARS`] characters,
/// preferring to break at the nearest preceding newline within the chunk so
/// words and paragraphs aren't torn mid-line (spec.md §6, §8 boundary
/// behavior: "a message of length 9,100 characters is sent as exactly 3
/// chunks").
pub fn split_for_transport(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= MAX_MESSAGE_CHARS {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let window_end = start + MAX_MESSAGE_CHARS;
        let split_at = chars[start..window_end]
            .iter()
            .rposition(|&c| c == '\n')
            .map(|i| start + i + 1)
            .unwrap_or(window_end);

        chunks.push(chars[start..split_at].iter().collect());
        start = split_at;
    }

    chunks
}
