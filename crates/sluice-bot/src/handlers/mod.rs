//! Event routing: every inbound event passes the access gate, then lands in
//! exactly one command, callback or message handler.

mod admin;
mod commands;
mod payment;
mod user;

use std::sync::Arc;
use std::time::Duration;

use sluice_gateway::{Gateway, Inbound, InboundKind, InlineKeyboard, SendOptions, Sender};
use sluice_shared::{Action, ChatId, ChatTarget, MessageRef, PaymentKind, UserId};
use sluice_store::Store;

use crate::broadcast::Broadcaster;
use crate::config::BotConfig;
use crate::distribution::{DistributionConfig, Distributor};
use crate::error::Result;
use crate::gate::{AccessGate, Verdict};
use crate::menus;
use crate::roster::Roster;
use crate::scheduler::Scheduler;
use crate::session::{ComposeStage, Interpretation, Session};

/// Everything a handler needs, cheap to clone into each chat worker.
#[derive(Clone)]
pub struct Bot {
    config: Arc<BotConfig>,
    store: Store,
    gateway: Arc<dyn Gateway>,
    roster: Roster,
    gate: AccessGate,
    distributor: Distributor,
    broadcaster: Broadcaster,
}

impl Bot {
    pub fn new(config: Arc<BotConfig>, store: Store, gateway: Arc<dyn Gateway>, roster: Roster) -> Self {
        let distribution = DistributionConfig::new(config.batch_size, config.daily_cap, config.retention);
        Self {
            gate: AccessGate::new(config.clone(), store.clone(), gateway.clone()),
            distributor: Distributor::new(store.clone(), gateway.clone(), distribution),
            broadcaster: Broadcaster::new(store.clone(), gateway.clone(), roster.clone()),
            config,
            store,
            gateway,
            roster,
        }
    }

    /// Override the delay between consecutive batch items and broadcast sends.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        let mut distribution = self.distributor.config().clone();
        distribution.pacing = pacing;
        self.distributor = Distributor::new(self.store.clone(), self.gateway.clone(), distribution);
        self.broadcaster = self.broadcaster.with_pacing(pacing);
        self
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Lifecycle jobs sharing this bot's store, gateway and roster.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.roster.clone(),
            self.config.reset_hour_utc,
        )
    }

    /// Handle one event for the chat that owns `session`.
    pub async fn handle(&self, session: &mut Session, inbound: Inbound) -> Result<()> {
        if self.gate.check(&inbound).await? != Verdict::Pass {
            return Ok(());
        }

        let chat = inbound.chat_id;
        let is_admin = inbound.sender_id().is_some_and(|id| self.config.is_admin(id));

        match &inbound.kind {
            InboundKind::Command { name, .. } => {
                self.on_command(session, &inbound, name, is_admin).await
            }
            InboundKind::Callback {
                id,
                action,
                message,
            } => {
                let Some(sender) = inbound.from.as_ref() else {
                    return Ok(());
                };
                self.on_callback(session, chat, sender, id, *action, *message, is_admin)
                    .await
            }
            InboundKind::Text { .. } | InboundKind::Media { .. } => {
                self.on_message(session, &inbound, is_admin).await
            }
        }
    }

    /// Best-effort apology after a handler failed.
    pub async fn apologize(&self, chat: ChatId) {
        if let Err(e) = self.reply(chat, menus::APOLOGY).await {
            tracing::debug!(chat = %chat, error = %e, "could not deliver apology");
        }
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn on_callback(
        &self,
        session: &mut Session,
        chat: ChatId,
        sender: &Sender,
        callback_id: &str,
        action: Action,
        message: Option<MessageRef>,
        is_admin: bool,
    ) -> Result<()> {
        if action.requires_admin() && !is_admin {
            tracing::info!(user = %sender.id, ?action, "admin action refused");
            self.gateway
                .answer_callback(callback_id, Some(menus::ADMIN_ONLY), true)
                .await?;
            return Ok(());
        }

        tracing::debug!(chat = %chat, user = %sender.id, ?action, "callback");

        // Review actions answer with their own outcome.
        match action {
            Action::ApprovePayment { user, kind } => {
                return self.approve_payment(chat, sender, callback_id, message, user, kind).await;
            }
            Action::RejectPayment { user } => {
                return self.reject_payment(chat, sender, callback_id, message, user).await;
            }
            Action::BanUser { user } => {
                return self.ban_user(chat, sender, callback_id, message, user).await;
            }
            Action::ViewUser { user } => {
                return self.view_user(chat, callback_id, user).await;
            }
            _ => {}
        }

        self.gateway.answer_callback(callback_id, None, false).await?;

        match action {
            Action::MainMenu => self.show_main_menu(session, chat).await,
            Action::GetBatch => self.get_batch(session, chat, sender.id).await,
            Action::Subscribe => {
                self.payment_instructions(session, chat, PaymentKind::Premium)
                    .await
            }
            Action::PurchaseGroup => self.purchase_group(session, chat, sender.id).await,
            Action::PurchaseGroupPay => {
                self.payment_instructions(session, chat, PaymentKind::Group)
                    .await
            }
            Action::Demo => self.demo(session, chat, sender).await,
            Action::CopyPaymentRef => self.copy_payment_ref(chat).await,
            Action::VerifyJoin => self.verify_join(chat, sender.id).await,

            Action::AdminBroadcastText => {
                self.start_compose(session, chat, ComposeStage::AwaitingText)
                    .await
            }
            Action::AdminBroadcastMedia => {
                self.start_compose(session, chat, ComposeStage::AwaitingMedia)
                    .await
            }
            Action::ConfirmBroadcast { target } => {
                self.confirm_broadcast(session, chat, sender.id, target, message)
                    .await
            }
            Action::AdminUpload => self.start_upload(session, chat).await,
            Action::AdminManageChannels => self.channel_menu(session, chat).await,
            Action::AddChannel => self.prompt_add_channel(session, chat).await,
            Action::ListChannels => self.list_channels(chat).await,
            Action::RemoveChannelMenu => self.remove_channel_menu(chat).await,
            Action::RemoveChannel { id } => self.remove_channel(session, chat, id).await,
            Action::AdminStats => self.stats(session, chat).await,
            Action::AdminDeleteBroadcast => self.delete_broadcast_menu(session, chat).await,
            Action::DeleteBroadcast { id } => self.revoke_broadcast(session, chat, id).await,
            Action::AdminCancel => self.admin_cancel(session, chat, message).await,

            Action::ApprovePayment { .. }
            | Action::RejectPayment { .. }
            | Action::BanUser { .. }
            | Action::ViewUser { .. } => Ok(()),
        }
    }

    async fn on_message(&self, session: &mut Session, inbound: &Inbound, is_admin: bool) -> Result<()> {
        let chat = inbound.chat_id;
        match session.interpret(inbound, is_admin) {
            Interpretation::BroadcastPayload(payload) => {
                self.hold_broadcast(session, chat, payload).await
            }
            Interpretation::Upload {
                kind,
                media_ref,
                caption,
            } => {
                let uploader = inbound.sender_id();
                self.upload(session, chat, uploader, kind, media_ref, caption)
                    .await
            }
            Interpretation::PaymentProof { kind, media_ref } => {
                let Some(sender) = inbound.from.as_ref() else {
                    return Ok(());
                };
                self.submit_proof(session, chat, sender, kind, &media_ref)
                    .await
            }
            Interpretation::ChannelRef(reference) => {
                let Some(admin) = inbound.sender_id() else {
                    return Ok(());
                };
                self.register_channel(session, chat, admin, reference).await
            }
            Interpretation::InvalidChannelRef(text) => {
                tracing::debug!(chat = %chat, text = %text, "unparsable channel reference");
                self.reply(chat, menus::CHANNEL_REF_INVALID).await.map(|_| ())
            }
            Interpretation::Ignored => {
                tracing::trace!(chat = %chat, mode = ?session.mode(), "message ignored");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Output helpers
    // ------------------------------------------------------------------

    async fn reply(&self, chat: ChatId, text: &str) -> Result<MessageRef> {
        Ok(self
            .gateway
            .send_text(&ChatTarget::from(chat), text, &SendOptions::default())
            .await?)
    }

    async fn reply_with(&self, chat: ChatId, text: &str, keyboard: InlineKeyboard) -> Result<MessageRef> {
        Ok(self
            .gateway
            .send_text(&ChatTarget::from(chat), text, &SendOptions::with_keyboard(keyboard))
            .await?)
    }

    /// Send a direct message to a user outside the current chat; failures
    /// are logged, never propagated.
    async fn notify(&self, user: UserId, text: &str, keyboard: Option<InlineKeyboard>) {
        let opts = keyboard.map(SendOptions::with_keyboard).unwrap_or_default();
        if let Err(e) = self
            .gateway
            .send_text(&ChatTarget::from(user), text, &opts)
            .await
        {
            tracing::warn!(user = %user, error = %e, "could not notify user");
        }
    }
}
