//! Operations on the [`ContentItem`] pool.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use sluice_shared::{MediaKind, UserId};

use crate::database::{parse_err, ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::{ContentItem, InsertOutcome, NewContent};

impl Database {
    /// Insert a content item unless one with the same `media_ref` exists.
    pub fn insert_content_if_absent(
        &self,
        new: &NewContent,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let item = ContentItem {
            id: Uuid::new_v4(),
            media_ref: new.media_ref.clone(),
            kind: new.kind,
            caption: new.caption.clone(),
            added_by: new.added_by,
            added_at: now,
        };

        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO content_items (id, media_ref, kind, caption, added_by, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id.to_string(),
                item.media_ref,
                item.kind.as_str(),
                item.caption,
                item.added_by.map(|u| u.0),
                ts_to_sql(&item.added_at),
            ],
        )?;

        if inserted == 0 {
            tracing::debug!(media_ref = %new.media_ref, "content already present");
            return Ok(InsertOutcome::AlreadyExists);
        }

        tracing::debug!(content_id = %item.id, kind = %item.kind, "content added");
        Ok(InsertOutcome::Inserted(item))
    }

    /// The whole pool, oldest first.
    pub fn find_all_content(&self) -> Result<Vec<ContentItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, media_ref, kind, caption, added_by, added_at
             FROM content_items
             ORDER BY added_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], row_to_content)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)
    }

    /// Every item whose id is not in `exclude`.
    pub fn find_content_excluding(&self, exclude: &BTreeSet<Uuid>) -> Result<Vec<ContentItem>> {
        let mut items = self.find_all_content()?;
        items.retain(|item| !exclude.contains(&item.id));
        Ok(items)
    }

    pub fn count_content(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM content_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_content(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContentItem> {
    let id: String = row.get(0)?;
    let kind: String = row.get(2)?;
    let added_by: Option<i64> = row.get(4)?;
    let added_at: String = row.get(5)?;

    Ok(ContentItem {
        id: uuid_from_sql(0, &id)?,
        media_ref: row.get(1)?,
        kind: kind
            .parse::<MediaKind>()
            .map_err(|e| parse_err(2, e))?,
        caption: row.get(3)?,
        added_by: added_by.map(UserId),
        added_at: ts_from_sql(5, &added_at)?,
    })
}
