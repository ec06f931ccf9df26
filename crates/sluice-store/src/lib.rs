//! # sluice-store
//!
//! Persistent state for the Sluice bot, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the four
//! collections (users, content items, channels, broadcast delivery records).
//! Every mutation of a single user is one SQL statement or one transaction,
//! so concurrent handlers and scheduler sweeps never lose updates.
//!
//! [`Store`] is the cloneable, thread-safe handle the async layers hold.

pub mod broadcasts;
pub mod channels;
pub mod content;
pub mod database;
pub mod migrations;
pub mod models;
pub mod stats;
pub mod store;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use store::Store;
