//! Checks that run before any handler sees a private-chat event: the
//! required-channel membership gate and the ban check.

use std::sync::Arc;

use sluice_gateway::{Gateway, Inbound, InboundKind, SendOptions};
use sluice_shared::{Action, ChatKind, UserId};
use sluice_store::Store;

use crate::config::BotConfig;
use crate::error::Result;
use crate::menus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    NotMember,
    Banned,
}

#[derive(Clone)]
pub struct AccessGate {
    config: Arc<BotConfig>,
    store: Store,
    gateway: Arc<dyn Gateway>,
}

impl AccessGate {
    pub fn new(config: Arc<BotConfig>, store: Store, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            config,
            store,
            gateway,
        }
    }

    /// Whether `user` has joined the required channel. Always true when no
    /// channel is configured; any lookup failure counts as "not a member".
    pub async fn is_member(&self, user: UserId) -> bool {
        let Some(channel) = &self.config.required_channel else {
            return true;
        };
        match self.gateway.get_chat_member(channel, user).await {
            Ok(status) => status.is_member(),
            Err(e) => {
                tracing::warn!(user = %user, channel = %channel, error = %e, "membership check failed");
                false
            }
        }
    }

    /// Decide whether `inbound` may reach the handlers. Group and channel
    /// events, events without a sender, and administrators always pass.
    pub async fn evaluate(&self, inbound: &Inbound) -> Verdict {
        if inbound.chat_kind != ChatKind::Private {
            return Verdict::Pass;
        }
        let Some(user) = inbound.sender_id() else {
            return Verdict::Pass;
        };
        if self.config.is_admin(user) {
            return Verdict::Pass;
        }

        let verifying = matches!(
            inbound.kind,
            InboundKind::Callback {
                action: Action::VerifyJoin,
                ..
            }
        );
        if !verifying && !self.is_member(user).await {
            return Verdict::NotMember;
        }

        match self.store.with(|db| db.find_user(user)) {
            Ok(Some(record)) if record.is_banned => Verdict::Banned,
            Ok(_) => Verdict::Pass,
            Err(e) => {
                tracing::error!(user = %user, error = %e, "ban check failed, letting event through");
                Verdict::Pass
            }
        }
    }

    /// Evaluate `inbound` and tell the sender why it was refused.
    pub async fn check(&self, inbound: &Inbound) -> Result<Verdict> {
        let verdict = self.evaluate(inbound).await;
        if verdict == Verdict::Pass {
            return Ok(verdict);
        }

        if let InboundKind::Callback { id, .. } = &inbound.kind {
            self.gateway.answer_callback(id, None, false).await?;
        }

        let chat = inbound.chat_id.into();
        match verdict {
            Verdict::NotMember => {
                let Some(channel) = &self.config.required_channel else {
                    return Ok(verdict);
                };
                let (text, keyboard) = menus::join_prompt(channel);
                self.gateway
                    .send_text(&chat, &text, &SendOptions::with_keyboard(keyboard))
                    .await?;
            }
            Verdict::Banned => {
                let text = menus::banned_notice(&self.config.support_handle);
                self.gateway
                    .send_text(&chat, &text, &SendOptions::default())
                    .await?;
            }
            Verdict::Pass => {}
        }

        tracing::debug!(chat = %inbound.chat_id, ?verdict, "event refused at the gate");
        Ok(verdict)
    }
}
