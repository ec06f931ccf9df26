//! In-process [`Gateway`] that records every call and fails on demand.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use sluice_shared::{ChatId, ChatTarget, MediaKind, MemberStatus, MessageId, MessageRef, UserId};

use crate::error::{GatewayError, Result};
use crate::gateway::{BotIdentity, ChatInfo, Gateway, InlineKeyboard, SendOptions};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendText {
        message: MessageRef,
        text: String,
        opts: SendOptions,
    },
    SendMedia {
        message: MessageRef,
        kind: MediaKind,
        media_ref: String,
        caption: Option<String>,
        opts: SendOptions,
    },
    EditText {
        message: MessageRef,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    EditCaption {
        message: MessageRef,
        caption: String,
    },
    Delete(MessageRef),
    Answer {
        id: String,
        text: Option<String>,
    },
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    next_message_id: i32,
    unreachable: HashSet<ChatId>,
    failing: HashSet<ChatId>,
    gone: HashSet<MessageRef>,
    members: HashMap<(ChatTarget, UserId), MemberStatus>,
    chats: HashMap<ChatTarget, ChatInfo>,
}

pub struct RecordingGateway {
    state: Mutex<MockState>,
    me: BotIdentity,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_message_id: 1000,
                ..MockState::default()
            }),
            me: BotIdentity { id: UserId(999) },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread poisons the lock; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sends to `chat` fail with a definitive "blocked" error.
    pub fn mark_unreachable(&self, chat: ChatId) {
        self.lock().unreachable.insert(chat);
    }

    /// Sends to `chat` fail with a transient server error.
    pub fn mark_failing(&self, chat: ChatId) {
        self.lock().failing.insert(chat);
    }

    /// Deleting `message` fails as if it had already been removed remotely.
    pub fn mark_gone(&self, message: MessageRef) {
        self.lock().gone.insert(message);
    }

    pub fn set_member(&self, chat: ChatTarget, user: UserId, status: MemberStatus) {
        self.lock().members.insert((chat, user), status);
    }

    pub fn add_chat(&self, target: ChatTarget, info: ChatInfo) {
        self.lock().chats.insert(target, info);
    }

    pub fn bot_id(&self) -> UserId {
        self.me.id
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Messages successfully sent (text or media), in order.
    pub fn sent(&self) -> Vec<MessageRef> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::SendText { message, .. } | Call::SendMedia { message, .. } => Some(*message),
                _ => None,
            })
            .collect()
    }

    pub fn sent_texts(&self, chat: ChatId) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::SendText { message, text, .. } if message.chat_id == chat => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Delete calls that were attempted, successful or not.
    pub fn deleted(&self) -> Vec<MessageRef> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Delete(m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn resolve(state: &MockState, chat: &ChatTarget) -> ChatId {
        match chat {
            ChatTarget::Id(id) => *id,
            ChatTarget::Handle(_) => state.chats.get(chat).map(|c| c.id).unwrap_or(ChatId(0)),
        }
    }

    fn check_send(state: &MockState, chat_id: ChatId) -> Result<()> {
        if state.unreachable.contains(&chat_id) {
            return Err(GatewayError::from_api(
                403,
                "Forbidden: bot was blocked by the user",
                None,
            ));
        }
        if state.failing.contains(&chat_id) {
            return Err(GatewayError::from_api(500, "Internal Server Error", None));
        }
        Ok(())
    }

    fn next_ref(state: &mut MockState, chat_id: ChatId) -> MessageRef {
        state.next_message_id += 1;
        MessageRef::new(chat_id, MessageId(state.next_message_id))
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn send_text(&self, chat: &ChatTarget, text: &str, opts: &SendOptions) -> Result<MessageRef> {
        let mut state = self.lock();
        let chat_id = Self::resolve(&state, chat);
        Self::check_send(&state, chat_id)?;
        let message = Self::next_ref(&mut state, chat_id);
        state.calls.push(Call::SendText {
            message,
            text: text.to_string(),
            opts: opts.clone(),
        });
        Ok(message)
    }

    async fn send_media(
        &self,
        chat: &ChatTarget,
        kind: MediaKind,
        media_ref: &str,
        caption: Option<&str>,
        opts: &SendOptions,
    ) -> Result<MessageRef> {
        let mut state = self.lock();
        let chat_id = Self::resolve(&state, chat);
        Self::check_send(&state, chat_id)?;
        let message = Self::next_ref(&mut state, chat_id);
        state.calls.push(Call::SendMedia {
            message,
            kind,
            media_ref: media_ref.to_string(),
            caption: caption.map(str::to_string),
            opts: opts.clone(),
        });
        Ok(message)
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.lock().calls.push(Call::EditText {
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn edit_caption(
        &self,
        message: MessageRef,
        caption: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.lock().calls.push(Call::EditCaption {
            message,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Delete(message));
        if state.gone.contains(&message) {
            return Err(GatewayError::from_api(
                400,
                "Bad Request: message to delete not found",
                None,
            ));
        }
        Ok(())
    }

    async fn get_chat_member(&self, chat: &ChatTarget, user: UserId) -> Result<MemberStatus> {
        let state = self.lock();
        Ok(state
            .members
            .get(&(chat.clone(), user))
            .copied()
            .unwrap_or(MemberStatus::Member))
    }

    async fn get_chat(&self, chat: &ChatTarget) -> Result<ChatInfo> {
        self.lock()
            .chats
            .get(chat)
            .cloned()
            .ok_or_else(|| GatewayError::from_api(400, "Bad Request: chat not found", None))
    }

    async fn get_me(&self) -> Result<BotIdentity> {
        Ok(self.me)
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, _show_alert: bool) -> Result<()> {
        self.lock().calls.push(Call::Answer {
            id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_shared::Payload;

    #[tokio::test]
    async fn records_sends_and_failures() {
        let gw = RecordingGateway::new();
        gw.mark_unreachable(ChatId(3));

        let ok = gw
            .send_payload(&ChatId(1).into(), &Payload::text("hi"), &SendOptions::default())
            .await
            .unwrap();
        assert_eq!(ok.chat_id, ChatId(1));

        let err = gw
            .send_text(&ChatId(3).into(), "hi", &SendOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_unreachable());

        assert_eq!(gw.sent(), vec![ok]);
        assert_eq!(gw.sent_texts(ChatId(1)), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn delete_of_gone_message_fails_but_is_recorded() {
        let gw = RecordingGateway::new();
        let msg = MessageRef::new(ChatId(1), MessageId(5));
        gw.mark_gone(msg);

        assert!(gw.delete_message(msg).await.is_err());
        assert_eq!(gw.deleted(), vec![msg]);
    }
}
