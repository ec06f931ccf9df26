//! Quota-gated, duplicate-avoiding content batches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use sluice_gateway::{Gateway, SendOptions};
use sluice_shared::constants::BATCH_PACING_MS;
use sluice_shared::{ChatId, ChatTarget, MessageRef};
use sluice_store::{ContentItem, ScheduledMessage, Store, User, UserUpdate};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct DistributionConfig {
    pub batch_size: usize,
    pub daily_cap: u32,
    pub retention: chrono::Duration,
    pub pacing: Duration,
}

impl DistributionConfig {
    pub fn new(batch_size: usize, daily_cap: u32, retention: chrono::Duration) -> Self {
        Self {
            batch_size,
            daily_cap,
            retention,
            pacing: Duration::from_millis(BATCH_PACING_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { is_first_batch_of_day: bool },
    LimitReached { cap: u32 },
}

/// Non-premium users are capped at `daily_cap` items per day; premium
/// users are never capped.
pub fn check_quota(user: &User, daily_cap: u32) -> QuotaDecision {
    if !user.is_premium && user.daily_count >= daily_cap {
        return QuotaDecision::LimitReached { cap: daily_cap };
    }
    QuotaDecision::Allowed {
        is_first_batch_of_day: user.daily_count == 0,
    }
}

/// Outcome of one batch request.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Items selected, in send order.
    pub items: Vec<ContentItem>,
    /// Messages that actually went out, in send order.
    pub delivered: Vec<MessageRef>,
    pub attempted: usize,
    pub is_first_batch_of_day: bool,
    /// The viewed set was cleared because too few unseen items were left.
    pub pool_reset: bool,
}

/// Uniformly shuffle `pool` and keep the first `n` items.
pub fn select_batch<R: Rng + ?Sized>(
    mut pool: Vec<ContentItem>,
    n: usize,
    rng: &mut R,
) -> Vec<ContentItem> {
    pool.shuffle(rng);
    pool.truncate(n);
    pool
}

#[derive(Clone)]
pub struct Distributor {
    store: Store,
    gateway: Arc<dyn Gateway>,
    config: DistributionConfig,
}

impl Distributor {
    pub fn new(store: Store, gateway: Arc<dyn Gateway>, config: DistributionConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Select, deliver and account one batch for `user` in `chat`.
    ///
    /// The quota is not checked here; callers run [`check_quota`] first.
    pub async fn request_batch(&self, user: &User, chat: ChatId) -> Result<Batch> {
        let batch_size = self.config.batch_size;
        let is_first_batch_of_day = user.daily_count == 0;

        let mut unseen = self
            .store
            .with(|db| db.find_content_excluding(&user.viewed_content))?;

        let mut pool_reset = false;
        if unseen.len() < batch_size {
            let all = self.store.with(|db| db.find_all_content())?;
            if all.is_empty() {
                tracing::info!(user = %user.id, "content pool is empty");
                return Ok(Batch {
                    is_first_batch_of_day,
                    ..Batch::default()
                });
            }
            if !user.viewed_content.is_empty() {
                self.store
                    .with(|db| db.update_user_atomic(user.id, &UserUpdate::new().clear_viewed()))?;
                pool_reset = true;
                tracing::debug!(
                    user = %user.id,
                    unseen = unseen.len(),
                    pool = all.len(),
                    "viewed set cleared"
                );
            }
            unseen = all;
        }

        let items = {
            let mut rng = rand::thread_rng();
            select_batch(unseen, batch_size, &mut rng)
        };

        let target = ChatTarget::from(chat);
        let mut delivered = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.pacing).await;
            }
            let caption = Some(item.caption.as_str()).filter(|c| !c.is_empty());
            match self
                .gateway
                .send_media(&target, item.kind, &item.media_ref, caption, &SendOptions::default())
                .await
            {
                Ok(message) => delivered.push(message),
                Err(e) => {
                    tracing::warn!(user = %user.id, content = %item.id, error = %e, "batch item not delivered");
                }
            }
        }

        let mut update = UserUpdate::new()
            .inc_daily_count(items.len() as u32)
            .add_viewed(items.iter().map(|i| i.id).collect::<Vec<Uuid>>());
        match Utc::now().checked_add_signed(self.config.retention) {
            Some(delete_at) => {
                update = update.push_scheduled(
                    delivered
                        .iter()
                        .map(|&message| ScheduledMessage { message, delete_at }),
                );
            }
            None => {
                tracing::warn!(
                    user = %user.id,
                    retention_minutes = self.config.retention.num_minutes(),
                    "retention overflows the calendar, batch will not expire"
                );
            }
        }
        let applied = self
            .store
            .with(|db| db.update_user_atomic(user.id, &update))?;
        if !applied {
            tracing::warn!(
                user = %user.id,
                delivered = ?delivered,
                "user vanished mid-batch, delivered messages not scheduled for deletion"
            );
        }

        tracing::info!(
            user = %user.id,
            attempted = items.len(),
            delivered = delivered.len(),
            pool_reset,
            "batch distributed"
        );

        Ok(Batch {
            attempted: items.len(),
            items,
            delivered,
            is_first_batch_of_day,
            pool_reset,
        })
    }
}
