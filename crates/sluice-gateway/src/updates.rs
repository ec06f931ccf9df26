//! Inbound events and the long-polling update source.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use sluice_shared::{Action, ChatId, ChatKind, MediaKind, MessageId, MessageRef, UserId};

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::telegram::TelegramGateway;
use crate::wire::{TgMessage, TgUpdate, TgUser};

/// Who sent an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// `/name args`
    Command { name: String, args: String },
    Text { text: String },
    Media {
        kind: MediaKind,
        media_ref: String,
        caption: Option<String>,
    },
    /// Inline-button press, already decoded to an [`Action`].
    Callback {
        id: String,
        action: Action,
        message: Option<MessageRef>,
    },
}

/// One event addressed to the bot, normalised away from the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub update_id: i64,
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub from: Option<Sender>,
    /// Source chat when the message was forwarded from a channel.
    pub forwarded_from: Option<ChatId>,
    pub kind: InboundKind,
}

impl Inbound {
    pub fn sender_id(&self) -> Option<UserId> {
        self.from.as_ref().map(|s| s.id)
    }
}

fn sender(user: &TgUser) -> Sender {
    Sender {
        id: UserId(user.id),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
    }
}

fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    // `/start@SomeBot` addresses the command to a specific bot in groups.
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.trim().to_string()))
}

fn message_kind(msg: &TgMessage) -> Option<InboundKind> {
    if let Some(sizes) = &msg.photo {
        let largest = sizes
            .iter()
            .max_by_key(|s| u64::from(s.width) * u64::from(s.height))?;
        return Some(InboundKind::Media {
            kind: MediaKind::Photo,
            media_ref: largest.file_id.clone(),
            caption: msg.caption.clone(),
        });
    }
    if let Some(video) = &msg.video {
        return Some(InboundKind::Media {
            kind: MediaKind::Video,
            media_ref: video.file_id.clone(),
            caption: msg.caption.clone(),
        });
    }
    if let Some(document) = &msg.document {
        return Some(InboundKind::Media {
            kind: MediaKind::Document,
            media_ref: document.file_id.clone(),
            caption: msg.caption.clone(),
        });
    }

    let text = msg.text.as_ref()?;
    Some(match parse_command(text) {
        Some((name, args)) => InboundKind::Command { name, args },
        None => InboundKind::Text { text: text.clone() },
    })
}

/// Convert a raw update. Returns `None` for updates the bot does not handle
/// and for callbacks whose data is not a valid [`Action`]; the latter are
/// returned as `Err` with the callback id so the caller can acknowledge them.
pub(crate) fn convert(update: TgUpdate) -> Result<Option<Inbound>, String> {
    if let Some(msg) = update.message {
        let Some(kind) = message_kind(&msg) else {
            return Ok(None);
        };
        let forwarded_from = msg
            .forward_origin
            .as_ref()
            .and_then(|o| o.chat.as_ref())
            .or(msg.forward_from_chat.as_ref())
            .map(|c| ChatId(c.id));
        return Ok(Some(Inbound {
            update_id: update.update_id,
            chat_id: ChatId(msg.chat.id),
            chat_kind: msg.chat.chat_kind(),
            from: msg.from.as_ref().map(sender),
            forwarded_from,
            kind,
        }));
    }

    if let Some(query) = update.callback_query {
        let Some(action) = query.data.as_deref().and_then(|d| Action::decode(d).ok()) else {
            return Err(query.id);
        };
        let message = query
            .message
            .as_ref()
            .map(|m| MessageRef::new(ChatId(m.chat.id), MessageId(m.message_id)));
        let (chat_id, chat_kind) = match &query.message {
            Some(m) => (ChatId(m.chat.id), m.chat.chat_kind()),
            None => (ChatId(query.from.id), ChatKind::Private),
        };
        return Ok(Some(Inbound {
            update_id: update.update_id,
            chat_id,
            chat_kind,
            from: Some(sender(&query.from)),
            forwarded_from: None,
            kind: InboundKind::Callback {
                id: query.id,
                action,
                message,
            },
        }));
    }

    Ok(None)
}

/// Spawn the long-poll loop. Events are pushed into `tx` until `shutdown`
/// flips to `true` or the receiver is dropped.
pub fn spawn_poller(
    gateway: Arc<TelegramGateway>,
    tx: mpsc::Sender<Inbound>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut offset: i64 = 0;
        tracing::info!("update poller started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                _ = shutdown.changed() => break,
                res = gateway.get_updates(offset) => res,
            };

            let updates = match batch {
                Ok(updates) => updates,
                Err(e) => {
                    let backoff = match &e {
                        GatewayError::RateLimited { retry_after } => *retry_after,
                        _ => 5,
                    };
                    tracing::warn!(error = %e, backoff_secs = backoff, "getUpdates failed");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(Duration::from_secs(backoff)) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                match convert(update) {
                    Ok(Some(inbound)) => {
                        if tx.send(inbound).await.is_err() {
                            tracing::info!("dispatcher gone, stopping poller");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(callback_id) => {
                        tracing::debug!(%callback_id, "ignoring undecodable callback");
                        if let Err(e) = gateway.answer_callback(&callback_id, None, false).await {
                            tracing::debug!(%callback_id, error = %e, "could not answer callback");
                        }
                    }
                }
            }
        }

        tracing::info!("update poller stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: serde_json::Value) -> TgUpdate {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/start@SluiceBot ref42"),
            Some(("start".to_string(), "ref42".to_string()))
        );
        assert_eq!(parse_command("/admin"), Some(("admin".into(), String::new())));
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/"), None);
    }

    #[test]
    fn photo_uses_largest_size() {
        let inbound = convert(update(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "chat": { "id": 42, "type": "private" },
                "from": { "id": 42, "first_name": "Ada" },
                "caption": "proof",
                "photo": [
                    { "file_id": "small", "width": 90, "height": 90 },
                    { "file_id": "large", "width": 1280, "height": 720 },
                    { "file_id": "mid", "width": 320, "height": 320 }
                ]
            }
        })))
        .unwrap()
        .unwrap();

        assert_eq!(inbound.chat_kind, ChatKind::Private);
        assert_eq!(inbound.sender_id(), Some(UserId(42)));
        assert_eq!(
            inbound.kind,
            InboundKind::Media {
                kind: MediaKind::Photo,
                media_ref: "large".into(),
                caption: Some("proof".into()),
            }
        );
    }

    #[test]
    fn forwarded_channel_post_records_origin() {
        let inbound = convert(update(serde_json::json!({
            "update_id": 11,
            "message": {
                "message_id": 6,
                "chat": { "id": 1, "type": "private" },
                "from": { "id": 1, "first_name": "Admin" },
                "text": "hello",
                "forward_origin": {
                    "type": "channel",
                    "chat": { "id": -1001, "type": "channel", "title": "News" }
                }
            }
        })))
        .unwrap()
        .unwrap();

        assert_eq!(inbound.forwarded_from, Some(ChatId(-1001)));
        assert_eq!(inbound.kind, InboundKind::Text { text: "hello".into() });
    }

    #[test]
    fn callback_decodes_action() {
        let inbound = convert(update(serde_json::json!({
            "update_id": 12,
            "callback_query": {
                "id": "cb-1",
                "from": { "id": 7, "first_name": "Bo" },
                "message": { "message_id": 99, "chat": { "id": 7, "type": "private" } },
                "data": Action::GetBatch.encode()
            }
        })))
        .unwrap()
        .unwrap();

        assert_eq!(
            inbound.kind,
            InboundKind::Callback {
                id: "cb-1".into(),
                action: Action::GetBatch,
                message: Some(MessageRef::new(ChatId(7), MessageId(99))),
            }
        );
    }

    #[test]
    fn garbage_callback_is_reported_for_acknowledgement() {
        let res = convert(update(serde_json::json!({
            "update_id": 13,
            "callback_query": {
                "id": "cb-2",
                "from": { "id": 7, "first_name": "Bo" },
                "data": "legacy_menu"
            }
        })));
        assert_eq!(res, Err("cb-2".to_string()));
    }
}
