//! Vocabulary shared by every Sluice crate: chat identifiers, the broadcast
//! payload variant, structured callback actions and tuning constants.

pub mod action;
pub mod constants;
pub mod error;
pub mod payload;
pub mod types;

pub use action::Action;
pub use error::ActionError;
pub use payload::Payload;
pub use types::*;
