//! Aggregate counts shown to administrators and the health API.

use crate::database::Database;
use crate::error::Result;
use crate::models::{StoreStats, UserFilter};

impl Database {
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            users: self.count_users(UserFilter::All)?,
            premium_users: self.count_users(UserFilter::Premium)?,
            group_access_users: self.count_users(UserFilter::GroupAccess)?,
            banned_users: self.count_users(UserFilter::Banned)?,
            content_items: self.count_content()?,
            channels: self.count_channels()?,
        })
    }
}
