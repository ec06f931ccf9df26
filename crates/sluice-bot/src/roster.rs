//! In-memory view of the registered channels.

use std::sync::Arc;

use tokio::sync::RwLock;

use sluice_store::{Channel, Store};

/// Shared, cheaply cloneable channel cache. `None` until the first refresh.
#[derive(Clone, Default)]
pub struct Roster {
    channels: Arc<RwLock<Option<Vec<Channel>>>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, channels: Vec<Channel>) {
        *self.channels.write().await = Some(channels);
    }

    /// Load the channel collection from `store` into the cache.
    pub async fn reload(&self, store: &Store) -> sluice_store::Result<usize> {
        let channels = store.with(|db| db.find_channels())?;
        let count = channels.len();
        self.replace(channels).await;
        Ok(count)
    }

    /// The cached list, or `None` if it has never been loaded.
    pub async fn snapshot(&self) -> Option<Vec<Channel>> {
        self.channels.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sluice_shared::{ChatId, UserId};
    use uuid::Uuid;

    #[tokio::test]
    async fn empty_until_loaded() {
        let roster = Roster::new();
        assert!(roster.snapshot().await.is_none());

        roster
            .replace(vec![Channel {
                id: Uuid::new_v4(),
                chat_id: ChatId(-1),
                title: "One".into(),
                username: None,
                invite_link: None,
                added_by: UserId(1),
                added_at: Utc::now(),
            }])
            .await;

        let clone = roster.clone();
        assert_eq!(clone.len().await, 1);
        assert_eq!(clone.snapshot().await.unwrap()[0].title, "One");
    }
}
