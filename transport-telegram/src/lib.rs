//! Concrete Telegram [`MessageTransport`] (spec.md §6 "bot API shape"):
//! long-polls `getUpdates`, sends replies through `sendMessage`, and
//! resolves file downloads through `getFile`, backed by `teloxide-core`'s
//! raw request builders rather than its dispatcher framework — the poll
//! loop itself already lives in
//! `optimaizer_core::runtime::AgentRuntimeManager`, so this crate only
//! needs to satisfy the port, not own a loop of its own.
//!
//! Two behaviors spec.md §6/§8 assign to the transport rather than the
//! engine:
//! - **Authorization**: only updates from the configured chat id are
//!   forwarded to the engine; any other chat gets a rejection reply and no
//!   tool ever runs for it (spec.md §8 "For every message from a chat id ≠
//!   authorized chat id, no tool executes...").
//! - **Markdown normalization** ([`normalize_markdown`]): outbound text is
//!   coerced to Telegram's legacy `Markdown` parse mode before it is sent.

mod markdown;

pub use markdown::normalize_markdown;

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use teloxide_core::payloads::GetUpdatesSetters;
use teloxide_core::requests::Requester;
use teloxide_core::types::{
    AllowedUpdate, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, UpdateKind,
};
use teloxide_core::Bot;
use tracing::warn;

use optimaizer_core::error::AgentError;
use optimaizer_core::transport::{InboundUpdate, KeyboardButton, MessageTransport, OutboundMessage};

/// Long-poll timeout passed to `getUpdates` (spec.md §5 "transport long-poll
/// 25 s").
const LONG_POLL_TIMEOUT_SECS: u32 = 25;

fn to_external(err: impl std::fmt::Display) -> AgentError {
    AgentError::ExternalError(err.to_string())
}

fn keyboard_to_markup(rows: &[Vec<KeyboardButton>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// A single-chat Telegram transport: one bot token, one authorized chat.
/// Matches spec.md §3's model of an agent owning exactly one messaging
/// integration — a differently-scoped deployment constructs one instance
/// per agent.
pub struct TelegramTransport {
    bot: Bot,
    authorized_chat_id: ChatId,
    /// `getUpdates` offset: the id one past the highest `update_id` seen so
    /// far, so the next poll doesn't redeliver already-handled updates.
    offset: AtomicI32,
}

impl TelegramTransport {
    /// `token` is the bot's plaintext API token (already decrypted by the
    /// caller, see `optimaizer_core::crypto`); `authorized_chat_id` is the
    /// only chat this transport will dispatch updates from. Honors
    /// `TELEGRAM_API_BASE_URL` (spec.md §6) when set and parseable, for
    /// pointing at a local Bot API server instead of `api.telegram.org`.
    pub fn new(token: impl Into<String>, authorized_chat_id: i64) -> Self {
        let mut bot = Bot::new(token);
        if let Ok(base_url) = std::env::var("TELEGRAM_API_BASE_URL") {
            match base_url.parse::<reqwest::Url>() {
                Ok(url) => bot = bot.set_api_url(url),
                Err(e) => warn!(error = %e, base_url, "ignoring invalid TELEGRAM_API_BASE_URL"),
            }
        }
        Self {
            bot,
            authorized_chat_id: ChatId(authorized_chat_id),
            offset: AtomicI32::new(0),
        }
    }
}

#[async_trait]
impl MessageTransport for TelegramTransport {
    async fn poll_updates(&self) -> Result<Vec<InboundUpdate>, AgentError> {
        let offset = self.offset.load(Ordering::SeqCst);
        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(LONG_POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
            .send()
            .await
            .map_err(to_external)?;

        let mut out = Vec::with_capacity(updates.len());
        for update in &updates {
            self.offset
                .fetch_max(update.id.0 as i32 + 1, Ordering::SeqCst);

            let Some(inbound) = self.classify(&update.kind) else {
                continue;
            };

            if inbound.chat_id() != self.authorized_chat_id.0.to_string() {
                warn!(chat_id = inbound.chat_id(), "rejecting unauthorized chat");
                let rejection = OutboundMessage::text(
                    inbound.chat_id().to_string(),
                    "This bot is not configured to respond in this chat.",
                );
                if let Err(e) = self.send_message(&rejection).await {
                    warn!(error = %e, "failed to send unauthorized-chat rejection");
                }
                continue;
            }

            out.push(inbound);
        }
        Ok(out)
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<(), AgentError> {
        let chat_id: i64 = message
            .chat_id
            .parse()
            .map_err(|_| AgentError::ValidationError(format!("invalid chat id: {}", message.chat_id)))?;

        let mut request = self
            .bot
            .send_message(ChatId(chat_id), normalize_markdown(&message.text))
            .parse_mode(ParseMode::Markdown);

        if let Some(rows) = &message.reply_markup {
            request = request.reply_markup(keyboard_to_markup(rows));
        }

        request.send().await.map_err(to_external)?;
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, AgentError> {
        let file = self
            .bot
            .get_file(file_id)
            .send()
            .await
            .map_err(to_external)?;

        let mut buf = Vec::new();
        teloxide_core::net::Download::download_file(&self.bot, &file.path, &mut buf)
            .await
            .map_err(to_external)?;
        Ok(buf)
    }
}

impl TelegramTransport {
    fn classify(&self, kind: &UpdateKind) -> Option<InboundUpdate> {
        match kind {
            UpdateKind::Message(msg) => {
                let chat_id = msg.chat.id.0.to_string();
                if let Some(loc) = msg.location() {
                    return Some(InboundUpdate::Location {
                        chat_id,
                        lat: loc.latitude,
                        lon: loc.longitude,
                    });
                }
                if let Some(doc) = msg.document() {
                    return Some(InboundUpdate::File {
                        chat_id,
                        file_id: doc.file.id.clone(),
                    });
                }
                if let Some(photos) = msg.photo() {
                    if let Some(largest) = photos.iter().max_by_key(|p| p.width) {
                        return Some(InboundUpdate::File {
                            chat_id,
                            file_id: largest.file.id.clone(),
                        });
                    }
                }
                msg.text().map(|text| InboundUpdate::Message {
                    chat_id,
                    text: text.to_string(),
                })
            }
            UpdateKind::CallbackQuery(cb) => {
                let chat_id = cb.message.as_ref()?.chat().id.0.to_string();
                Some(InboundUpdate::ButtonCallback {
                    chat_id,
                    callback_data: cb.data.clone().unwrap_or_default(),
                })
            }
            _ => None,
        }
    }
}
