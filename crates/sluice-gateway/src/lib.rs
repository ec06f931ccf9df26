//! # sluice-gateway
//!
//! The chat-platform boundary of Sluice: the [`Gateway`] trait the engines
//! depend on, its Telegram Bot API implementation, and the long-polling
//! source that turns raw updates into [`Inbound`] events.
//!
//! Callback data is encoded to and decoded from [`sluice_shared::Action`]
//! here and nowhere else.

pub mod error;
pub mod gateway;
pub mod telegram;
pub mod updates;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

mod wire;

pub use error::{GatewayError, Result};
pub use gateway::{BotIdentity, Button, ButtonKind, ChatInfo, Gateway, InlineKeyboard, SendOptions};
pub use telegram::TelegramGateway;
pub use updates::{spawn_poller, Inbound, InboundKind, Sender};

#[cfg(any(test, feature = "mock"))]
pub use mock::{Call, RecordingGateway};
