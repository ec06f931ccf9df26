//! Cloneable, thread-safe handle around a [`Database`].

use std::sync::{Arc, Mutex};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Shared handle held by handlers, the scheduler and the health API.
///
/// Each call to [`Store::with`] holds the connection for the duration of one
/// closure, so every multi-statement helper on [`Database`] runs without
/// interleaving.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run `f` against the locked database.
    pub fn with<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserFilter, UserProfile};
    use chrono::Utc;
    use sluice_shared::UserId;

    #[test]
    fn clones_share_one_database() {
        let store = Store::open_in_memory().unwrap();
        let other = store.clone();

        store
            .with(|db| db.upsert_user(UserId(1), &UserProfile::default(), Utc::now()))
            .unwrap();
        let count = other.with(|db| db.count_users(UserFilter::All)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn usable_across_threads() {
        let store = Store::open_in_memory().unwrap();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .with(|db| db.upsert_user(UserId(i), &UserProfile::default(), Utc::now()))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.with(|db| db.count_users(UserFilter::All)).unwrap(), 4);
    }
}
