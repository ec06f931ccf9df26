//! v001 -- Initial schema creation.
//!
//! Creates the four collections (`users`, `content_items`, `channels`,
//! `broadcasts`) plus the two per-user child tables that hold the
//! viewed-content set and the scheduled-deletion list.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id               INTEGER PRIMARY KEY NOT NULL,  -- platform user id
    first_name       TEXT,
    last_name        TEXT,
    username         TEXT,
    daily_count      INTEGER NOT NULL DEFAULT 0,
    last_reset       TEXT NOT NULL,                 -- RFC-3339
    is_premium       INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    has_group_access INTEGER NOT NULL DEFAULT 0,
    is_banned        INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Content items
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS content_items (
    id        TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    media_ref TEXT NOT NULL UNIQUE,        -- dedup key
    kind      TEXT NOT NULL,               -- photo / video / document
    caption   TEXT NOT NULL DEFAULT '',
    added_by  INTEGER,
    added_at  TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Viewed content (set semantics via the composite key)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS viewed_content (
    user_id    INTEGER NOT NULL,
    content_id TEXT NOT NULL,

    PRIMARY KEY (user_id, content_id),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (content_id) REFERENCES content_items(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Scheduled deletions (ordered by insertion id)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS scheduled_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL,
    chat_id    INTEGER NOT NULL,
    message_id INTEGER NOT NULL,
    delete_at  TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_scheduled_delete_at
    ON scheduled_messages(delete_at);

-- ----------------------------------------------------------------
-- Channels
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS channels (
    id          TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    chat_id     INTEGER NOT NULL UNIQUE,     -- platform chat id
    title       TEXT NOT NULL,
    username    TEXT,
    invite_link TEXT,
    added_by    INTEGER NOT NULL,
    added_at    TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Broadcast delivery records
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS broadcasts (
    id           TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    chat_id      INTEGER NOT NULL,
    message_id   INTEGER NOT NULL,
    payload      TEXT NOT NULL,              -- JSON
    target_class TEXT NOT NULL,              -- user / channel
    sent_at      TEXT NOT NULL,
    sent_by      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_broadcasts_sent_at
    ON broadcasts(sent_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
