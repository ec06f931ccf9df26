//! The abstract messaging gateway the bot engines talk to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sluice_shared::{Action, ChatId, ChatKind, ChatTarget, MediaKind, MemberStatus, MessageRef, Payload, UserId};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Keyboards and send options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonKind {
    Callback(Action),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub kind: ButtonKind,
}

impl Button {
    pub fn callback(text: impl Into<String>, action: Action) -> Self {
        Self {
            text: text.into(),
            kind: ButtonKind::Callback(action),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ButtonKind::Url(url.into()),
        }
    }
}

/// Rows of inline buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<Button>>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: impl IntoIterator<Item = Button>) -> Self {
        self.rows.push(buttons.into_iter().collect());
        self
    }

    /// Append a row holding a single button.
    pub fn button(self, button: Button) -> Self {
        self.row([button])
    }

    /// Every callback action on the keyboard, row by row.
    pub fn actions(&self) -> Vec<Action> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|b| match b.kind {
                ButtonKind::Callback(action) => Some(action),
                ButtonKind::Url(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub keyboard: Option<InlineKeyboard>,
    /// Deliver without a notification sound.
    pub silent: bool,
    /// Blur media until tapped.
    pub spoiler: bool,
}

impl SendOptions {
    pub fn with_keyboard(keyboard: InlineKeyboard) -> Self {
        Self {
            keyboard: Some(keyboard),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// Resolved metadata of a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
    pub invite_link: Option<String>,
}

/// The bot's own account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: UserId,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Outbound operations against the chat platform.
///
/// Implementations must be cheap to share behind an `Arc`; every method may
/// be called concurrently from different chat workers and scheduler loops.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_text(&self, chat: &ChatTarget, text: &str, opts: &SendOptions) -> Result<MessageRef>;

    async fn send_media(
        &self,
        chat: &ChatTarget,
        kind: MediaKind,
        media_ref: &str,
        caption: Option<&str>,
        opts: &SendOptions,
    ) -> Result<MessageRef>;

    /// Send either payload variant.
    async fn send_payload(
        &self,
        chat: &ChatTarget,
        payload: &Payload,
        opts: &SendOptions,
    ) -> Result<MessageRef> {
        match payload {
            Payload::Text { body } => self.send_text(chat, body, opts).await,
            Payload::Media {
                kind,
                media_ref,
                caption,
            } => {
                self.send_media(chat, *kind, media_ref, caption.as_deref(), opts)
                    .await
            }
        }
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()>;

    async fn edit_caption(
        &self,
        message: MessageRef,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()>;

    async fn delete_message(&self, message: MessageRef) -> Result<()>;

    async fn get_chat_member(&self, chat: &ChatTarget, user: UserId) -> Result<MemberStatus>;

    async fn get_chat(&self, chat: &ChatTarget) -> Result<ChatInfo>;

    async fn get_me(&self) -> Result<BotIdentity>;

    /// Acknowledge an inline-button press, optionally with a toast or alert.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, show_alert: bool) -> Result<()>;
}
