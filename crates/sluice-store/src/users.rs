//! Operations on [`User`] records and their child tables.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use sluice_shared::{ChatId, MessageId, MessageRef, UserId};

use crate::database::{ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::{ScheduledMessage, User, UserFilter, UserProfile, UserUpdate};

const USER_COLUMNS: &str = "id, first_name, last_name, username, daily_count, last_reset,
     is_premium, has_group_access, is_banned, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create / upsert
    // ------------------------------------------------------------------

    /// Insert the user on first contact, or refresh the profile fields of an
    /// existing user. Counters, flags and child rows are left untouched.
    pub fn upsert_user(
        &self,
        id: UserId,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let now_sql = ts_to_sql(&now);
        self.conn().execute(
            "INSERT INTO users (id, first_name, last_name, username, last_reset, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 first_name = excluded.first_name,
                 last_name  = excluded.last_name,
                 username   = excluded.username",
            params![
                id.0,
                profile.first_name,
                profile.last_name,
                profile.username,
                now_sql,
            ],
        )?;

        self.find_user(id)?.ok_or(StoreError::NotFound)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a user together with its viewed set and scheduled list.
    pub fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                row_to_user,
            )
            .optional()?;

        let Some(mut user) = user else {
            return Ok(None);
        };

        let mut stmt = self
            .conn()
            .prepare("SELECT content_id FROM viewed_content WHERE user_id = ?1")?;
        let viewed = stmt.query_map(params![id.0], |row| {
            let raw: String = row.get(0)?;
            uuid_from_sql(0, &raw)
        })?;
        user.viewed_content = viewed.collect::<rusqlite::Result<BTreeSet<_>>>()?;

        let mut stmt = self.conn().prepare(
            "SELECT chat_id, message_id, delete_at
             FROM scheduled_messages
             WHERE user_id = ?1
             ORDER BY id ASC",
        )?;
        let scheduled = stmt.query_map(params![id.0], row_to_scheduled)?;
        user.scheduled_messages = scheduled.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(user))
    }

    /// All user ids in stable registration order.
    pub fn find_user_ids(&self) -> Result<Vec<UserId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id FROM users ORDER BY created_at ASC, id ASC")?;
        let rows = stmt.query_map([], |row| Ok(UserId(row.get(0)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)
    }

    /// Every user with its child rows loaded, in registration order.
    pub fn find_all_users(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for id in self.find_user_ids()? {
            if let Some(user) = self.find_user(id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    pub fn count_users(&self, filter: UserFilter) -> Result<u64> {
        let sql = match filter {
            UserFilter::All => "SELECT COUNT(*) FROM users",
            UserFilter::Premium => "SELECT COUNT(*) FROM users WHERE is_premium = 1",
            UserFilter::GroupAccess => "SELECT COUNT(*) FROM users WHERE has_group_access = 1",
            UserFilter::Banned => "SELECT COUNT(*) FROM users WHERE is_banned = 1",
        };
        let count: i64 = self.conn().query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Every scheduled entry due at or before `now`, grouped per user.
    pub fn find_users_with_due_messages(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(UserId, Vec<ScheduledMessage>)>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_id, chat_id, message_id, delete_at
             FROM scheduled_messages
             WHERE delete_at <= ?1
             ORDER BY user_id ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![ts_to_sql(&now)], |row| {
            let user = UserId(row.get(0)?);
            let chat_id = ChatId(row.get(1)?);
            let message_id = MessageId(row.get(2)?);
            let raw: String = row.get(3)?;
            Ok((
                user,
                ScheduledMessage {
                    message: MessageRef::new(chat_id, message_id),
                    delete_at: ts_from_sql(3, &raw)?,
                },
            ))
        })?;

        let mut grouped: Vec<(UserId, Vec<ScheduledMessage>)> = Vec::new();
        for row in rows {
            let (user, entry) = row?;
            match grouped.last_mut() {
                Some((last, entries)) if *last == user => entries.push(entry),
                _ => grouped.push((user, vec![entry])),
            }
        }
        Ok(grouped)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply `update` to one user in a single transaction.
    ///
    /// Returns `false` (and changes nothing) if the user does not exist.
    pub fn update_user_atomic(&self, id: UserId, update: &UserUpdate) -> Result<bool> {
        let tx = self.conn().unchecked_transaction()?;

        let affected = tx.execute(
            "UPDATE users SET
                 is_premium       = COALESCE(?2, is_premium),
                 has_group_access = COALESCE(?3, has_group_access),
                 is_banned        = COALESCE(?4, is_banned),
                 daily_count      = COALESCE(?5, daily_count) + ?6,
                 last_reset       = COALESCE(?7, last_reset)
             WHERE id = ?1",
            params![
                id.0,
                update.set.is_premium,
                update.set.has_group_access,
                update.set.is_banned,
                update.set.daily_count,
                update.inc_daily_count,
                update.set.last_reset.as_ref().map(ts_to_sql),
            ],
        )?;
        if affected == 0 {
            return Ok(false);
        }

        if update.clear_viewed {
            tx.execute(
                "DELETE FROM viewed_content WHERE user_id = ?1",
                params![id.0],
            )?;
        }

        if !update.add_viewed.is_empty() {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO viewed_content (user_id, content_id) VALUES (?1, ?2)",
            )?;
            for content_id in &update.add_viewed {
                stmt.execute(params![id.0, content_id.to_string()])?;
            }
        }

        if !update.push_scheduled.is_empty() {
            let mut stmt = tx.prepare(
                "INSERT INTO scheduled_messages (user_id, chat_id, message_id, delete_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in &update.push_scheduled {
                stmt.execute(params![
                    id.0,
                    entry.message.chat_id.0,
                    entry.message.message_id.0,
                    ts_to_sql(&entry.delete_at),
                ])?;
            }
        }

        if let Some(cutoff) = update.pull_due_before {
            tx.execute(
                "DELETE FROM scheduled_messages WHERE user_id = ?1 AND delete_at <= ?2",
                params![id.0, ts_to_sql(&cutoff)],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    /// Remove every scheduled entry of `id` due at or before `now`.
    /// Returns the number of entries removed.
    pub fn pull_due_messages(&self, id: UserId, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM scheduled_messages WHERE user_id = ?1 AND delete_at <= ?2",
            params![id.0, ts_to_sql(&now)],
        )?;
        Ok(affected)
    }

    /// Zero every user's daily counter in one statement.
    pub fn reset_all_daily_counts(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE users SET daily_count = 0, last_reset = ?1",
            params![ts_to_sql(&now)],
        )?;
        Ok(affected)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a user and (via cascade) its viewed and scheduled rows.
    pub fn delete_user(&self, id: UserId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.0])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let last_reset: String = row.get(5)?;
    let created_at: String = row.get(9)?;

    Ok(User {
        id: UserId(row.get(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        username: row.get(3)?,
        daily_count: row.get(4)?,
        last_reset: ts_from_sql(5, &last_reset)?,
        is_premium: row.get(6)?,
        has_group_access: row.get(7)?,
        is_banned: row.get(8)?,
        viewed_content: BTreeSet::new(),
        scheduled_messages: Vec::new(),
        created_at: ts_from_sql(9, &created_at)?,
    })
}

fn row_to_scheduled(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledMessage> {
    let chat_id = ChatId(row.get(0)?);
    let message_id = MessageId(row.get(1)?);
    let raw: String = row.get(2)?;
    Ok(ScheduledMessage {
        message: MessageRef::new(chat_id, message_id),
        delete_at: ts_from_sql(2, &raw)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewContent, UserFields};
    use chrono::Duration;
    use sluice_shared::MediaKind;
    use uuid::Uuid;

    fn profile(name: &str) -> UserProfile {
        UserProfile {
            first_name: Some(name.to_string()),
            last_name: None,
            username: Some(name.to_lowercase()),
        }
    }

    fn add_content(db: &Database, media_ref: &str) -> Uuid {
        match db
            .insert_content_if_absent(
                &NewContent {
                    media_ref: media_ref.to_string(),
                    kind: MediaKind::Video,
                    caption: String::new(),
                    added_by: None,
                },
                Utc::now(),
            )
            .unwrap()
        {
            crate::InsertOutcome::Inserted(item) => item.id,
            crate::InsertOutcome::AlreadyExists => panic!("duplicate fixture"),
        }
    }

    fn scheduled(chat: i64, msg: i32, delete_at: DateTime<Utc>) -> ScheduledMessage {
        ScheduledMessage {
            message: MessageRef::new(ChatId(chat), MessageId(msg)),
            delete_at,
        }
    }

    #[test]
    fn upsert_creates_then_refreshes_profile_only() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let user = db.upsert_user(UserId(7), &profile("Ada"), now).unwrap();
        assert_eq!(user.daily_count, 0);
        assert!(!user.is_premium);
        assert!(user.viewed_content.is_empty());

        db.update_user_atomic(UserId(7), &UserUpdate::new().inc_daily_count(10))
            .unwrap();
        let user = db.upsert_user(UserId(7), &profile("Grace"), now).unwrap();
        assert_eq!(user.first_name.as_deref(), Some("Grace"));
        assert_eq!(user.daily_count, 10);
        assert_eq!(db.count_users(UserFilter::All).unwrap(), 1);
    }

    #[test]
    fn atomic_update_applies_every_operator() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.upsert_user(UserId(1), &profile("A"), now).unwrap();
        let a = add_content(&db, "a");
        let b = add_content(&db, "b");

        let update = UserUpdate::new()
            .inc_daily_count(2)
            .add_viewed([a, b, a])
            .push_scheduled([
                scheduled(1, 10, now + Duration::minutes(30)),
                scheduled(1, 11, now + Duration::minutes(30)),
            ])
            .set(UserFields {
                is_premium: Some(true),
                ..UserFields::default()
            });
        assert!(db.update_user_atomic(UserId(1), &update).unwrap());

        let user = db.find_user(UserId(1)).unwrap().unwrap();
        assert_eq!(user.daily_count, 2);
        assert!(user.is_premium);
        assert_eq!(user.viewed_content, [a, b].into_iter().collect());
        let ids: Vec<i32> = user
            .scheduled_messages
            .iter()
            .map(|s| s.message.message_id.0)
            .collect();
        assert_eq!(ids, vec![10, 11]);

        // Clearing happens before adding within the same update.
        db.update_user_atomic(UserId(1), &UserUpdate::new().clear_viewed().add_viewed([b]))
            .unwrap();
        let user = db.find_user(UserId(1)).unwrap().unwrap();
        assert_eq!(user.viewed_content, [b].into_iter().collect());
    }

    #[test]
    fn update_of_missing_user_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let applied = db
            .update_user_atomic(
                UserId(404),
                &UserUpdate::new().push_scheduled([scheduled(404, 1, Utc::now())]),
            )
            .unwrap();
        assert!(!applied);
        assert!(db
            .find_users_with_due_messages(Utc::now() + Duration::days(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn due_messages_grouped_and_pulled() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        for id in [1, 2] {
            db.upsert_user(UserId(id), &profile("U"), now).unwrap();
        }
        db.update_user_atomic(
            UserId(1),
            &UserUpdate::new().push_scheduled([
                scheduled(1, 1, now - Duration::minutes(1)),
                scheduled(1, 2, now + Duration::minutes(5)),
                scheduled(1, 3, now),
            ]),
        )
        .unwrap();
        db.update_user_atomic(
            UserId(2),
            &UserUpdate::new().push_scheduled([scheduled(2, 9, now - Duration::seconds(5))]),
        )
        .unwrap();

        let due = db.find_users_with_due_messages(now).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].0, UserId(1));
        assert_eq!(due[0].1.len(), 2);
        assert_eq!(due[1].1[0].message.message_id, MessageId(9));

        assert_eq!(db.pull_due_messages(UserId(1), now).unwrap(), 2);
        let user = db.find_user(UserId(1)).unwrap().unwrap();
        assert_eq!(user.scheduled_messages.len(), 1);
        assert_eq!(user.scheduled_messages[0].message.message_id, MessageId(2));
    }

    #[test]
    fn reset_counts_and_filters() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        for id in 1..=3 {
            db.upsert_user(UserId(id), &profile("U"), now).unwrap();
            db.update_user_atomic(UserId(id), &UserUpdate::new().inc_daily_count(30))
                .unwrap();
        }
        db.update_user_atomic(
            UserId(2),
            &UserUpdate::new().set(UserFields {
                is_premium: Some(true),
                has_group_access: Some(true),
                ..UserFields::default()
            }),
        )
        .unwrap();

        let later = now + Duration::hours(1);
        assert_eq!(db.reset_all_daily_counts(later).unwrap(), 3);
        for id in 1..=3 {
            let user = db.find_user(UserId(id)).unwrap().unwrap();
            assert_eq!(user.daily_count, 0);
            assert_eq!(ts_to_sql(&user.last_reset), ts_to_sql(&later));
        }

        assert_eq!(db.count_users(UserFilter::Premium).unwrap(), 1);
        assert_eq!(db.count_users(UserFilter::GroupAccess).unwrap(), 1);
        assert_eq!(db.count_users(UserFilter::Banned).unwrap(), 0);
    }

    #[test]
    fn delete_cascades_child_rows() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.upsert_user(UserId(5), &profile("U"), now).unwrap();
        let c = add_content(&db, "c");
        db.update_user_atomic(
            UserId(5),
            &UserUpdate::new()
                .add_viewed([c])
                .push_scheduled([scheduled(5, 1, now - Duration::minutes(1))]),
        )
        .unwrap();

        assert!(db.delete_user(UserId(5)).unwrap());
        assert!(!db.delete_user(UserId(5)).unwrap());
        assert!(db.find_user(UserId(5)).unwrap().is_none());
        assert!(db.find_users_with_due_messages(now).unwrap().is_empty());
        assert_eq!(db.find_user_ids().unwrap(), Vec::<UserId>::new());
    }
}
