//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! straight to the health API or logged as JSON.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sluice_shared::{ChatId, MediaKind, MessageRef, Payload, RecipientClass, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A person who has contacted the bot at least once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    /// Content items delivered since the last daily reset.
    pub daily_count: u32,
    pub last_reset: DateTime<Utc>,
    pub is_premium: bool,
    pub has_group_access: bool,
    pub is_banned: bool,
    /// Content already delivered to this user since the pool last ran dry.
    pub viewed_content: BTreeSet<Uuid>,
    /// Messages awaiting deletion, in insertion order.
    pub scheduled_messages: Vec<ScheduledMessage>,
    pub created_at: DateTime<Utc>,
}

/// Profile fields refreshed on every first-contact upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// A sent message that must be deleted once `delete_at` has passed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledMessage {
    pub message: MessageRef,
    pub delete_at: DateTime<Utc>,
}

/// Predicate accepted by `count_users`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    All,
    Premium,
    GroupAccess,
    Banned,
}

/// Scalar fields that may be overwritten by an atomic user update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFields {
    pub is_premium: Option<bool>,
    pub has_group_access: Option<bool>,
    pub is_banned: Option<bool>,
    pub daily_count: Option<u32>,
    pub last_reset: Option<DateTime<Utc>>,
}

/// A set of changes applied to one user inside a single transaction.
///
/// Mirrors a document-store update: `$set`, `$inc`, `$addToSet`, `$push`
/// and `$pull`. Scalar `set` is applied before `inc`; `clear_viewed` is
/// applied before `add_viewed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub set: UserFields,
    pub inc_daily_count: u32,
    pub clear_viewed: bool,
    pub add_viewed: Vec<Uuid>,
    pub push_scheduled: Vec<ScheduledMessage>,
    /// Remove every scheduled entry due at or before this instant.
    pub pull_due_before: Option<DateTime<Utc>>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, fields: UserFields) -> Self {
        self.set = fields;
        self
    }

    pub fn inc_daily_count(mut self, by: u32) -> Self {
        self.inc_daily_count += by;
        self
    }

    pub fn clear_viewed(mut self) -> Self {
        self.clear_viewed = true;
        self
    }

    pub fn add_viewed(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.add_viewed.extend(ids);
        self
    }

    pub fn push_scheduled(mut self, entries: impl IntoIterator<Item = ScheduledMessage>) -> Self {
        self.push_scheduled.extend(entries);
        self
    }

    pub fn pull_due(mut self, now: DateTime<Utc>) -> Self {
        self.pull_due_before = Some(now);
        self
    }
}

// ---------------------------------------------------------------------------
// Content item
// ---------------------------------------------------------------------------

/// A piece of media that can be handed out in batches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    pub id: Uuid,
    /// Opaque platform media reference; unique across the collection.
    pub media_ref: String,
    pub kind: MediaKind,
    pub caption: String,
    pub added_by: Option<UserId>,
    pub added_at: DateTime<Utc>,
}

/// Input for `insert_content_if_absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContent {
    pub media_ref: String,
    pub kind: MediaKind,
    pub caption: String,
    pub added_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(ContentItem),
    AlreadyExists,
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A chat registered by an administrator as a broadcast target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: Uuid,
    pub chat_id: ChatId,
    pub title: String,
    pub username: Option<String>,
    pub invite_link: Option<String>,
    pub added_by: UserId,
    pub added_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Broadcast delivery record
// ---------------------------------------------------------------------------

/// Proof that one broadcast message reached one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastRecord {
    pub id: Uuid,
    pub message: MessageRef,
    pub payload: Payload,
    pub target_class: RecipientClass,
    pub sent_at: DateTime<Utc>,
    pub sent_by: UserId,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Collection counts at one point in time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub users: u64,
    pub premium_users: u64,
    pub group_access_users: u64,
    pub banned_users: u64,
    pub content_items: u64,
    pub channels: u64,
}
