use chrono::Utc;
use uuid::Uuid;

use sluice_shared::constants::RECENT_BROADCAST_LIMIT;
use sluice_shared::{BroadcastTarget, ChatId, ChatTarget, MediaKind, MessageRef, Payload, UserId};
use sluice_store::{Channel, InsertOutcome, NewContent};

use super::Bot;
use crate::broadcast::Revocation;
use crate::error::Result;
use crate::menus;
use crate::session::{ChannelRef, ComposeStage, Mode, Session};

impl Bot {
    // ------------------------------------------------------------------
    // Broadcast compose and confirm
    // ------------------------------------------------------------------

    pub(super) async fn start_compose(&self, session: &mut Session, chat: ChatId, stage: ComposeStage) -> Result<()> {
        session.enter(Mode::BroadcastCompose(stage), true);
        let prompt = match stage {
            ComposeStage::AwaitingMedia => menus::COMPOSE_MEDIA,
            _ => menus::COMPOSE_TEXT,
        };
        self.reply_with(chat, prompt, menus::cancel_keyboard()).await?;
        Ok(())
    }

    pub(super) async fn hold_broadcast(&self, session: &mut Session, chat: ChatId, payload: Payload) -> Result<()> {
        let (text, keyboard) = menus::broadcast_preview(&payload);
        if session.hold_broadcast(payload) {
            self.reply_with(chat, &text, keyboard).await?;
        }
        Ok(())
    }

    pub(super) async fn confirm_broadcast(
        &self,
        session: &mut Session,
        chat: ChatId,
        initiator: UserId,
        target: BroadcastTarget,
        status: Option<MessageRef>,
    ) -> Result<()> {
        let Some(payload) = session.take_pending_broadcast() else {
            self.reply(chat, menus::NOTHING_TO_SEND).await?;
            return Ok(());
        };

        let report = self
            .broadcaster
            .broadcast(target, &payload, initiator, status)
            .await?;
        let tally = menus::broadcast_tally(report.success, report.failure);

        let edited = match status {
            Some(status) => self.gateway.edit_text(status, &tally, None).await.is_ok(),
            None => false,
        };
        if !edited {
            self.reply(chat, &tally).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Content upload
    // ------------------------------------------------------------------

    pub(super) async fn start_upload(&self, session: &mut Session, chat: ChatId) -> Result<()> {
        session.enter(Mode::UploadPending, true);
        self.reply_with(chat, menus::UPLOAD_PROMPT, menus::cancel_keyboard())
            .await?;
        Ok(())
    }

    pub(super) async fn upload(
        &self,
        session: &mut Session,
        chat: ChatId,
        uploader: Option<UserId>,
        kind: MediaKind,
        media_ref: String,
        caption: String,
    ) -> Result<()> {
        session.reset();
        let content = NewContent {
            media_ref,
            kind,
            caption,
            added_by: uploader,
        };
        let outcome = self
            .store
            .with(|db| db.insert_content_if_absent(&content, Utc::now()))?;

        let text = match outcome {
            InsertOutcome::Inserted(item) => {
                tracing::info!(content = %item.id, kind = %item.kind, "content uploaded");
                menus::UPLOAD_DONE
            }
            InsertOutcome::AlreadyExists => {
                tracing::debug!(media_ref = %content.media_ref, "duplicate upload rejected");
                menus::UPLOAD_DUPLICATE
            }
        };
        self.reply(chat, text).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Channel management
    // ------------------------------------------------------------------

    pub(super) async fn channel_menu(&self, session: &mut Session, chat: ChatId) -> Result<()> {
        session.enter(Mode::ChannelManagement { awaiting_ref: false }, true);
        let (text, keyboard) = menus::channel_menu();
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    pub(super) async fn prompt_add_channel(&self, session: &mut Session, chat: ChatId) -> Result<()> {
        session.enter(Mode::ChannelManagement { awaiting_ref: true }, true);
        self.reply_with(chat, menus::ADD_CHANNEL_HELP, menus::cancel_keyboard())
            .await?;
        Ok(())
    }

    /// Resolve the referenced chat, confirm the bot administers it, and
    /// register it as a broadcast target.
    pub(super) async fn register_channel(
        &self,
        session: &mut Session,
        chat: ChatId,
        admin: UserId,
        reference: ChannelRef,
    ) -> Result<()> {
        let target = match reference {
            ChannelRef::Target(target) => target,
            ChannelRef::Forwarded(id) => ChatTarget::Id(id),
        };

        let info = match self.gateway.get_chat(&target).await {
            Ok(info) => info,
            Err(e) => {
                tracing::info!(channel = %target, error = %e, "channel lookup failed");
                self.reply(chat, menus::CHANNEL_NOT_FOUND).await?;
                return Ok(());
            }
        };
        let title = info.title.clone().unwrap_or_else(|| target.to_string());

        if !self.bot_is_admin(ChatTarget::Id(info.id)).await {
            self.reply(chat, &menus::bot_not_admin(&title)).await?;
            return Ok(());
        }

        let channel = Channel {
            id: Uuid::new_v4(),
            chat_id: info.id,
            title,
            username: info.username,
            invite_link: info.invite_link,
            added_by: admin,
            added_at: Utc::now(),
        };
        let inserted = self.store.with(|db| db.insert_channel(&channel))?;
        session.enter(Mode::ChannelManagement { awaiting_ref: false }, true);

        let text = if inserted {
            let active = self.roster.reload(&self.store).await?;
            tracing::debug!(channels = active, "roster reloaded after registration");
            menus::channel_added(&channel)
        } else {
            menus::channel_already_registered(&channel.title)
        };
        let (_, keyboard) = menus::channel_menu();
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    pub(super) async fn list_channels(&self, chat: ChatId) -> Result<()> {
        let channels = self.store.with(|db| db.find_channels())?;
        if channels.is_empty() {
            self.reply(chat, menus::NO_CHANNELS).await?;
            return Ok(());
        }

        let mut rows = Vec::with_capacity(channels.len());
        for channel in channels {
            let admin = self.bot_is_admin(ChatTarget::Id(channel.chat_id)).await;
            rows.push((channel, admin));
        }
        self.reply(chat, &menus::channel_list(&rows)).await?;
        Ok(())
    }

    pub(super) async fn remove_channel_menu(&self, chat: ChatId) -> Result<()> {
        let channels = self.store.with(|db| db.find_channels())?;
        if channels.is_empty() {
            self.reply(chat, menus::NO_CHANNELS_TO_REMOVE).await?;
            return Ok(());
        }
        let (text, keyboard) = menus::remove_channel_menu(&channels);
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    pub(super) async fn remove_channel(&self, session: &mut Session, chat: ChatId, id: Uuid) -> Result<()> {
        match self.store.with(|db| db.delete_channel(id))? {
            Some(channel) => {
                self.roster.reload(&self.store).await?;
                tracing::info!(channel = %channel.chat_id, "channel removed");
                self.reply(chat, &menus::channel_removed(&channel)).await?;
            }
            None => {
                self.reply(chat, menus::CHANNEL_GONE).await?;
            }
        }
        self.show_admin_panel(session, chat).await
    }

    async fn bot_is_admin(&self, chat: ChatTarget) -> bool {
        let me = match self.gateway.get_me().await {
            Ok(me) => me,
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch bot identity");
                return false;
            }
        };
        match self.gateway.get_chat_member(&chat, me.id).await {
            Ok(status) => status.is_admin(),
            Err(e) => {
                tracing::debug!(chat = %chat, error = %e, "bot membership lookup failed");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Stats and broadcast history
    // ------------------------------------------------------------------

    pub(super) async fn stats(&self, session: &mut Session, chat: ChatId) -> Result<()> {
        session.enter(Mode::Stats, true);
        let stats = self.store.with(|db| db.stats())?;
        self.reply(chat, &menus::stats(&stats)).await?;
        Ok(())
    }

    pub(super) async fn delete_broadcast_menu(&self, session: &mut Session, chat: ChatId) -> Result<()> {
        session.enter(Mode::DeleteBroadcast, true);
        let records = self.broadcaster.recent(RECENT_BROADCAST_LIMIT)?;
        if records.is_empty() {
            self.reply(chat, menus::NO_RECENT_BROADCASTS).await?;
            return Ok(());
        }
        let (text, keyboard) = menus::delete_broadcast_menu(&records);
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    pub(super) async fn revoke_broadcast(&self, session: &mut Session, chat: ChatId, id: Uuid) -> Result<()> {
        let text = match self.broadcaster.revoke(id).await? {
            Revocation::Revoked { remote_deleted: true } => menus::BROADCAST_REVOKED,
            Revocation::Revoked { remote_deleted: false } => menus::BROADCAST_RECORD_DROPPED,
            Revocation::NotFound => menus::BROADCAST_NOT_FOUND,
        };
        self.reply(chat, text).await?;
        self.show_admin_panel(session, chat).await
    }

    /// Drop whatever the admin was doing, remove the menu the button was on,
    /// and show the admin panel again.
    pub(super) async fn admin_cancel(&self, session: &mut Session, chat: ChatId, menu: Option<MessageRef>) -> Result<()> {
        if let Some(menu) = menu {
            if let Err(e) = self.gateway.delete_message(menu).await {
                tracing::debug!(chat = %chat, error = %e, "could not remove cancelled menu");
            }
        }
        self.show_admin_panel(session, chat).await
    }
}
