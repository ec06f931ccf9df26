//! Broadcast fan-out with per-recipient accounting and revocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use sluice_gateway::{Gateway, SendOptions};
use sluice_shared::constants::BROADCAST_PACING_MS;
use sluice_shared::{BroadcastTarget, ChatId, ChatTarget, MessageRef, Payload, RecipientClass, UserId};
use sluice_store::{BroadcastRecord, Store, StoreError};

use crate::error::Result;
use crate::roster::Roster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipient {
    pub chat: ChatId,
    pub class: RecipientClass,
}

#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub success: usize,
    pub failure: usize,
    pub records: Vec<BroadcastRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    /// The record is gone; `remote_deleted` tells whether the message
    /// itself could be removed from the recipient's chat.
    Revoked { remote_deleted: bool },
    NotFound,
}

#[derive(Clone)]
pub struct Broadcaster {
    store: Store,
    gateway: Arc<dyn Gateway>,
    roster: Roster,
    pacing: Duration,
}

impl Broadcaster {
    pub fn new(store: Store, gateway: Arc<dyn Gateway>, roster: Roster) -> Self {
        Self {
            store,
            gateway,
            roster,
            pacing: Duration::from_millis(BROADCAST_PACING_MS),
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Users first (registration order), then channels (title order).
    pub async fn recipients(&self, target: BroadcastTarget) -> Result<Vec<Recipient>> {
        let mut out = Vec::new();

        if target.includes_users() {
            let ids = self.store.with(|db| db.find_user_ids())?;
            out.extend(ids.into_iter().map(|id| Recipient {
                chat: id.into(),
                class: RecipientClass::User,
            }));
        }

        if target.includes_channels() {
            let channels = match self.roster.snapshot().await {
                Some(channels) => channels,
                None => self.store.with(|db| db.find_channels())?,
            };
            out.extend(channels.into_iter().map(|c| Recipient {
                chat: c.chat_id,
                class: RecipientClass::Channel,
            }));
        }

        Ok(out)
    }

    /// Send `payload` to every recipient of `target`, then persist one
    /// delivery record per successful send.
    ///
    /// When `status` is given it is edited to show progress.
    pub async fn broadcast(
        &self,
        target: BroadcastTarget,
        payload: &Payload,
        initiator: UserId,
        status: Option<MessageRef>,
    ) -> Result<BroadcastReport> {
        let recipients = self.recipients(target).await?;

        if let Some(status) = status {
            let text = format!("📤 Sending to {} recipients…", recipients.len());
            if let Err(e) = self.gateway.edit_text(status, &text, None).await {
                tracing::debug!(error = %e, "could not update broadcast status");
            }
        }

        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..BroadcastReport::default()
        };

        for (i, recipient) in recipients.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            let chat = ChatTarget::from(recipient.chat);
            match self
                .gateway
                .send_payload(&chat, payload, &SendOptions::default())
                .await
            {
                Ok(message) => {
                    report.success += 1;
                    report.records.push(BroadcastRecord {
                        id: Uuid::new_v4(),
                        message,
                        payload: payload.clone(),
                        target_class: recipient.class,
                        sent_at: Utc::now(),
                        sent_by: initiator,
                    });
                }
                Err(e) => {
                    report.failure += 1;
                    tracing::warn!(
                        chat = %recipient.chat,
                        class = recipient.class.as_str(),
                        error = %e,
                        "broadcast send failed"
                    );
                }
            }
        }

        self.store
            .with(|db| db.insert_broadcast_records(&report.records))?;

        tracing::info!(
            broadcast_target = %target,
            initiator = %initiator,
            success = report.success,
            failure = report.failure,
            "broadcast finished"
        );
        Ok(report)
    }

    /// Remove a delivery record, deleting its message remotely if possible.
    pub async fn revoke(&self, id: Uuid) -> Result<Revocation> {
        let record = match self.store.with(|db| db.find_broadcast(id)) {
            Ok(record) => record,
            Err(StoreError::NotFound) => return Ok(Revocation::NotFound),
            Err(e) => return Err(e.into()),
        };

        let remote_deleted = match self.gateway.delete_message(record.message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(broadcast = %id, error = %e, "remote delete failed, dropping record anyway");
                false
            }
        };

        self.store.with(|db| db.delete_broadcast_record(id))?;
        Ok(Revocation::Revoked { remote_deleted })
    }

    /// Latest delivery records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<BroadcastRecord>> {
        Ok(self.store.with(|db| db.find_recent_broadcasts(limit))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_gateway::RecordingGateway;
    use sluice_store::{Channel, UserProfile};

    fn setup() -> (Store, Arc<RecordingGateway>, Roster) {
        (
            Store::open_in_memory().unwrap(),
            Arc::new(RecordingGateway::new()),
            Roster::new(),
        )
    }

    fn channel(chat: i64, title: &str) -> Channel {
        Channel {
            id: Uuid::new_v4(),
            chat_id: ChatId(chat),
            title: title.into(),
            username: None,
            invite_link: None,
            added_by: UserId(1),
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recipients_prefer_loaded_roster() {
        let (store, gw, roster) = setup();
        store
            .with(|db| {
                db.upsert_user(UserId(10), &UserProfile::default(), Utc::now())?;
                db.insert_channel(&channel(-1, "stored"))
            })
            .unwrap();
        let b = Broadcaster::new(store, gw, roster.clone());

        // Not loaded yet: falls back to the store.
        let all = b.recipients(BroadcastTarget::All).await.unwrap();
        assert_eq!(
            all,
            vec![
                Recipient { chat: ChatId(10), class: RecipientClass::User },
                Recipient { chat: ChatId(-1), class: RecipientClass::Channel },
            ]
        );

        roster.replace(vec![channel(-2, "cached")]).await;
        let channels = b.recipients(BroadcastTarget::Channels).await.unwrap();
        assert_eq!(channels, vec![Recipient { chat: ChatId(-2), class: RecipientClass::Channel }]);
    }

    #[tokio::test(start_paused = true)]
    async fn status_message_shows_progress() {
        let (store, gw, roster) = setup();
        store
            .with(|db| db.upsert_user(UserId(10), &UserProfile::default(), Utc::now()))
            .unwrap();
        let b = Broadcaster::new(store, gw.clone(), roster);
        let status = MessageRef::new(ChatId(1), sluice_shared::MessageId(1));

        let report = b
            .broadcast(BroadcastTarget::Users, &Payload::text("hi"), UserId(1), Some(status))
            .await
            .unwrap();
        assert_eq!(report.success, 1);
        assert!(gw.calls().iter().any(|c| matches!(
            c,
            sluice_gateway::Call::EditText { message, .. } if *message == status
        )));
    }

    #[tokio::test]
    async fn revoke_unknown_is_not_found() {
        let (store, gw, roster) = setup();
        let b = Broadcaster::new(store, gw.clone(), roster);
        assert_eq!(b.revoke(Uuid::new_v4()).await.unwrap(), Revocation::NotFound);
        assert!(gw.deleted().is_empty());
    }
}
