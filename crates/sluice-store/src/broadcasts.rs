//! Persistence of broadcast delivery records.

use rusqlite::params;
use uuid::Uuid;

use sluice_shared::{ChatId, MessageId, MessageRef, Payload, RecipientClass, UserId};

use crate::database::{conversion_err, parse_err, ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::BroadcastRecord;

const RECORD_COLUMNS: &str = "id, chat_id, message_id, payload, target_class, sent_at, sent_by";

impl Database {
    /// Insert every record of one broadcast run in a single transaction.
    pub fn insert_broadcast_records(&self, records: &[BroadcastRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO broadcasts
                     (id, chat_id, message_id, payload, target_class, sent_at, sent_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.id.to_string(),
                    record.message.chat_id.0,
                    record.message.message_id.0,
                    serde_json::to_string(&record.payload)?,
                    record.target_class.as_str(),
                    ts_to_sql(&record.sent_at),
                    record.sent_by.0,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = records.len(), "broadcast records stored");
        Ok(records.len())
    }

    /// Most recent records first.
    pub fn find_recent_broadcasts(&self, limit: usize) -> Result<Vec<BroadcastRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM broadcasts
             ORDER BY sent_at DESC, rowid DESC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn find_broadcast(&self, id: Uuid) -> Result<BroadcastRecord> {
        self.conn()
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM broadcasts WHERE id = ?1"),
                params![id.to_string()],
                row_to_record,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn delete_broadcast_record(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM broadcasts WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<BroadcastRecord> {
    let id: String = row.get(0)?;
    let payload: String = row.get(3)?;
    let target_class: String = row.get(4)?;
    let sent_at: String = row.get(5)?;

    Ok(BroadcastRecord {
        id: uuid_from_sql(0, &id)?,
        message: MessageRef::new(ChatId(row.get(1)?), MessageId(row.get(2)?)),
        payload: serde_json::from_str::<Payload>(&payload).map_err(|e| conversion_err(3, e))?,
        target_class: target_class
            .parse::<RecipientClass>()
            .map_err(|e| parse_err(4, e))?,
        sent_at: ts_from_sql(5, &sent_at)?,
        sent_by: UserId(row.get(6)?),
    })
}
