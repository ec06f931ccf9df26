//! CRUD operations for registered broadcast [`Channel`]s.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use sluice_shared::{ChatId, UserId};

use crate::database::{ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::Channel;

const CHANNEL_COLUMNS: &str = "id, chat_id, title, username, invite_link, added_by, added_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Register a channel. Returns `false` if its chat id is already known.
    pub fn insert_channel(&self, channel: &Channel) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO channels
                 (id, chat_id, title, username, invite_link, added_by, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                channel.id.to_string(),
                channel.chat_id.0,
                channel.title,
                channel.username,
                channel.invite_link,
                channel.added_by.0,
                ts_to_sql(&channel.added_at),
            ],
        )?;

        if inserted > 0 {
            tracing::info!(
                channel_id = %channel.id,
                chat_id = %channel.chat_id,
                title = %channel.title,
                "channel registered"
            );
        }
        Ok(inserted > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All channels ordered by title.
    pub fn find_channels(&self) -> Result<Vec<Channel>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels ORDER BY title COLLATE NOCASE ASC, added_at ASC"
        ))?;
        let rows = stmt.query_map([], row_to_channel)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn get_channel(&self, id: Uuid) -> Result<Channel> {
        self.conn()
            .query_row(
                &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1"),
                params![id.to_string()],
                row_to_channel,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn find_channel_by_chat(&self, chat_id: ChatId) -> Result<Option<Channel>> {
        let channel = self
            .conn()
            .query_row(
                &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE chat_id = ?1"),
                params![chat_id.0],
                row_to_channel,
            )
            .optional()?;
        Ok(channel)
    }

    pub fn count_channels(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM channels", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Remove a channel, returning the removed row if it existed.
    pub fn delete_channel(&self, id: Uuid) -> Result<Option<Channel>> {
        let existing = match self.get_channel(id) {
            Ok(channel) => channel,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        self.conn().execute(
            "DELETE FROM channels WHERE id = ?1",
            params![id.to_string()],
        )?;

        tracing::info!(channel_id = %id, title = %existing.title, "channel removed");
        Ok(Some(existing))
    }
}

fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    let id: String = row.get(0)?;
    let added_at: String = row.get(6)?;

    Ok(Channel {
        id: uuid_from_sql(0, &id)?,
        chat_id: ChatId(row.get(1)?),
        title: row.get(2)?,
        username: row.get(3)?,
        invite_link: row.get(4)?,
        added_by: UserId(row.get(5)?),
        added_at: ts_from_sql(6, &added_at)?,
    })
}
