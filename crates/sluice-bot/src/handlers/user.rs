use chrono::Utc;

use sluice_gateway::{SendOptions, Sender};
use sluice_shared::constants::DEMO_RETENTION_SECS;
use sluice_shared::{ChatId, ChatTarget, MediaKind, PaymentKind, UserId};
use sluice_store::{ScheduledMessage, UserProfile, UserUpdate};

use super::Bot;
use crate::distribution::{check_quota, QuotaDecision};
use crate::error::Result;
use crate::menus;
use crate::session::{Mode, Session};

impl Bot {
    pub(super) async fn show_main_menu(&self, session: &mut Session, chat: ChatId) -> Result<()> {
        session.reset();
        let (text, keyboard) = menus::main_menu(self.config.batch_size);
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    pub(super) async fn get_batch(&self, session: &mut Session, chat: ChatId, user: UserId) -> Result<()> {
        session.reset();

        let Some(record) = self.store.with(|db| db.find_user(user))? else {
            self.reply(chat, menus::START_FIRST).await?;
            return Ok(());
        };

        if let QuotaDecision::LimitReached { cap } = check_quota(&record, self.config.daily_cap) {
            tracing::info!(user = %user, daily_count = record.daily_count, "daily limit reached");
            let (text, keyboard) = menus::limit_reached(cap);
            self.reply_with(chat, &text, keyboard).await?;
            return Ok(());
        }

        let batch = self.distributor.request_batch(&record, chat).await?;
        if batch.items.is_empty() {
            let (text, keyboard) = menus::empty_pool();
            self.reply_with(chat, &text, keyboard).await?;
            return Ok(());
        }

        if batch.is_first_batch_of_day {
            let (text, keyboard) = menus::after_first_batch(self.config.batch_size);
            self.reply_with(chat, &text, keyboard).await?;
            Ok(())
        } else {
            self.show_main_menu(session, chat).await
        }
    }

    pub(super) async fn payment_instructions(
        &self,
        session: &mut Session,
        chat: ChatId,
        kind: PaymentKind,
    ) -> Result<()> {
        session.enter(Mode::PaymentPending(kind), false);
        let (text, keyboard) = menus::payment_instructions(
            kind,
            &self.config.purchase_group_price,
            &self.config.upi_id,
        );
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    pub(super) async fn purchase_group(&self, session: &mut Session, chat: ChatId, user: UserId) -> Result<()> {
        session.reset();
        let has_access = self
            .store
            .with(|db| db.find_user(user))?
            .is_some_and(|u| u.has_group_access);

        let (text, keyboard) = if has_access {
            menus::group_access_granted(&self.config.purchase_group_link)
        } else {
            menus::purchase_group_offer(&self.config.purchase_group_price)
        };
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    /// Send the spoilered demo photo and schedule it for deletion through the
    /// regular expiry sweep.
    pub(super) async fn demo(&self, session: &mut Session, chat: ChatId, sender: &Sender) -> Result<()> {
        session.reset();

        let Some(media_ref) = self.config.demo_media.as_deref() else {
            tracing::warn!("demo requested but DEMO_MEDIA is not configured");
            self.reply(chat, menus::DEMO_UNAVAILABLE).await?;
            return Ok(());
        };

        let opts = SendOptions {
            spoiler: true,
            ..SendOptions::default()
        };
        let message = match self
            .gateway
            .send_media(
                &ChatTarget::from(chat),
                MediaKind::Photo,
                media_ref,
                Some(menus::DEMO_CAPTION),
                &opts,
            )
            .await
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(chat = %chat, error = %e, "demo send failed");
                self.reply(chat, menus::DEMO_UNAVAILABLE).await?;
                return Ok(());
            }
        };

        let profile = UserProfile {
            first_name: sender.first_name.clone(),
            last_name: sender.last_name.clone(),
            username: sender.username.clone(),
        };
        let entry = ScheduledMessage {
            message,
            delete_at: Utc::now() + chrono::Duration::seconds(DEMO_RETENTION_SECS),
        };
        self.store.with(|db| {
            db.upsert_user(sender.id, &profile, Utc::now())?;
            db.update_user_atomic(sender.id, &UserUpdate::new().push_scheduled([entry]))
        })?;
        Ok(())
    }

    pub(super) async fn copy_payment_ref(&self, chat: ChatId) -> Result<()> {
        let (text, keyboard) = menus::copy_payment_ref(&self.config.upi_id);
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    pub(super) async fn verify_join(&self, chat: ChatId, user: UserId) -> Result<()> {
        let text = if self.gate.is_member(user).await {
            menus::ACCESS_GRANTED
        } else {
            menus::STILL_NOT_MEMBER
        };
        self.reply(chat, text).await?;
        Ok(())
    }
}
