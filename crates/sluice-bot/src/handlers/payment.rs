use chrono::Utc;

use sluice_gateway::{SendOptions, Sender};
use sluice_shared::{ChatId, ChatTarget, MediaKind, MessageRef, PaymentKind, UserId};
use sluice_store::{UserFields, UserUpdate};

use super::Bot;
use crate::error::Result;
use crate::menus::{self, ReviewOutcome};
use crate::session::Session;

impl Bot {
    /// Forward a payment screenshot to the review chat.
    pub(super) async fn submit_proof(
        &self,
        session: &mut Session,
        chat: ChatId,
        sender: &Sender,
        kind: PaymentKind,
        media_ref: &str,
    ) -> Result<()> {
        session.reset();

        let Some(review_chat) = self.config.admin_group else {
            tracing::warn!(user = %sender.id, "payment proof received but ADMIN_GROUP_ID is not set");
            self.reply(chat, &menus::review_unavailable(&self.config.support_handle))
                .await?;
            return Ok(());
        };

        let caption = menus::review_caption(kind, sender, &self.config.purchase_group_price);
        let opts = SendOptions::with_keyboard(menus::review_keyboard(sender.id, kind));
        if let Err(e) = self
            .gateway
            .send_media(
                &ChatTarget::from(review_chat),
                MediaKind::Photo,
                media_ref,
                Some(&caption),
                &opts,
            )
            .await
        {
            tracing::error!(user = %sender.id, error = %e, "could not forward payment proof");
            self.reply(chat, menus::PROOF_FAILED).await?;
            return Ok(());
        }

        tracing::info!(user = %sender.id, %kind, "payment proof forwarded for review");
        let (text, keyboard) = menus::proof_received(&self.config.support_handle);
        self.reply_with(chat, &text, keyboard).await?;
        Ok(())
    }

    pub(super) async fn approve_payment(
        &self,
        chat: ChatId,
        reviewer: &Sender,
        callback_id: &str,
        proof: Option<MessageRef>,
        user: UserId,
        kind: PaymentKind,
    ) -> Result<()> {
        let mut fields = UserFields {
            is_banned: Some(false),
            ..UserFields::default()
        };
        match kind {
            PaymentKind::Premium => fields.is_premium = Some(true),
            PaymentKind::Group => fields.has_group_access = Some(true),
        }
        self.review(chat, reviewer, callback_id, proof, user, fields, ReviewOutcome::Approved(kind))
            .await
    }

    pub(super) async fn reject_payment(
        &self,
        chat: ChatId,
        reviewer: &Sender,
        callback_id: &str,
        proof: Option<MessageRef>,
        user: UserId,
    ) -> Result<()> {
        self.review(chat, reviewer, callback_id, proof, user, UserFields::default(), ReviewOutcome::Rejected)
            .await
    }

    pub(super) async fn ban_user(
        &self,
        chat: ChatId,
        reviewer: &Sender,
        callback_id: &str,
        proof: Option<MessageRef>,
        user: UserId,
    ) -> Result<()> {
        let fields = UserFields {
            is_banned: Some(true),
            is_premium: Some(false),
            has_group_access: Some(false),
            ..UserFields::default()
        };
        self.review(chat, reviewer, callback_id, proof, user, fields, ReviewOutcome::Banned)
            .await
    }

    pub(super) async fn view_user(&self, chat: ChatId, callback_id: &str, user: UserId) -> Result<()> {
        let Some(record) = self.store.with(|db| db.find_user(user))? else {
            self.gateway
                .answer_callback(callback_id, Some(menus::USER_NOT_FOUND), false)
                .await?;
            return Ok(());
        };
        let toast = format!("👤 Viewing user {user}");
        self.gateway
            .answer_callback(callback_id, Some(&toast), false)
            .await?;
        self.reply(chat, &menus::user_info(&record)).await?;
        Ok(())
    }

    /// Apply a review decision: update the user, rewrite the proof caption,
    /// tell the user, and acknowledge the button press.
    #[allow(clippy::too_many_arguments)]
    async fn review(
        &self,
        chat: ChatId,
        reviewer: &Sender,
        callback_id: &str,
        proof: Option<MessageRef>,
        user: UserId,
        fields: UserFields,
        outcome: ReviewOutcome,
    ) -> Result<()> {
        let Some(record) = self.store.with(|db| db.find_user(user))? else {
            self.gateway
                .answer_callback(callback_id, Some(menus::USER_NOT_FOUND), true)
                .await?;
            return Ok(());
        };

        if fields != UserFields::default() {
            self.store
                .with(|db| db.update_user_atomic(user, &UserUpdate::new().set(fields)))?;
        }
        tracing::info!(user = %user, reviewer = %reviewer.id, ?outcome, "payment reviewed");

        let at = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
        let summary = menus::review_result(outcome, &record, reviewer, &at);
        let edited = match proof {
            Some(proof) => self.gateway.edit_caption(proof, &summary, None).await.is_ok(),
            None => false,
        };
        if !edited {
            self.reply(chat, &summary).await?;
        }

        let (notice, keyboard) = menus::review_notice(
            outcome,
            &self.config.purchase_group_link,
            &self.config.support_handle,
        );
        self.notify(user, &notice, keyboard).await;

        self.gateway
            .answer_callback(callback_id, Some(menus::review_toast(outcome)), false)
            .await?;
        Ok(())
    }
}
