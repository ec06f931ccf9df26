//! Bot configuration loaded from environment variables.
//!
//! Only `BOT_TOKEN` is required. Malformed optional tunables fall back to
//! their defaults with a warning; malformed identities (`ADMINS`,
//! `REQUIRED_CHANNEL`) abort startup.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use sluice_shared::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_BATCH_SIZE, DEFAULT_DAILY_CAP, DEFAULT_REQUIRED_CHANNEL,
    DEFAULT_RETENTION_MINUTES, MAX_RETENTION_MINUTES,
};
use sluice_shared::{ChatId, ChatTarget, UserId};

use crate::error::ConfigError;

#[derive(Clone)]
pub struct BotConfig {
    /// Bot API credential.
    /// Env: `BOT_TOKEN` (required)
    pub token: String,

    /// Users allowed into the admin panel.
    /// Env: `ADMINS` (comma-separated numeric IDs)
    pub admins: Vec<UserId>,

    /// Chat that receives payment proofs for review.
    /// Env: `ADMIN_GROUP_ID`
    pub admin_group: Option<ChatId>,

    /// Channel every private-chat user must have joined.
    /// Env: `REQUIRED_CHANNEL` (empty disables the gate)
    /// Default: `@awt_bots`
    pub required_channel: Option<ChatTarget>,

    /// Env: `VIDEO_BATCH_SIZE`, default 10
    pub batch_size: usize,

    /// Env: `DAILY_VIDEO_LIMIT`, default 30
    pub daily_cap: u32,

    /// How long delivered content stays visible.
    /// Env: `MESSAGE_DELETE_MINUTES`, default 30
    pub retention: chrono::Duration,

    /// Env: `PURCHASE_GROUP_LINK`
    pub purchase_group_link: String,

    /// Env: `PURCHASE_GROUP_PRICE`
    pub purchase_group_price: String,

    /// Payment reference shown to paying users.
    /// Env: `UPI_ID`
    pub upi_id: String,

    /// Env: `SUPPORT_HANDLE`
    pub support_handle: String,

    /// Photo reference sent by the demo button.
    /// Env: `DEMO_MEDIA`
    pub demo_media: Option<String>,

    /// Env: `DATABASE_PATH`
    /// Default: platform data directory
    pub database_path: Option<PathBuf>,

    /// UTC hour at which quotas reset and inactive users are pruned.
    /// Env: `RESET_HOUR_UTC`, default 0
    pub reset_hour_utc: u32,

    /// Env: `API_BASE_URL`
    pub api_base_url: String,

    /// Enables the health API when set.
    /// Env: `HEALTH_ADDR`
    pub health_addr: Option<SocketAddr>,

    /// A chat worker with no events for this long exits and drops its session.
    pub worker_idle: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            admins: Vec::new(),
            admin_group: None,
            required_channel: Some(ChatTarget::Handle(DEFAULT_REQUIRED_CHANNEL.to_string())),
            batch_size: DEFAULT_BATCH_SIZE,
            daily_cap: DEFAULT_DAILY_CAP,
            retention: chrono::Duration::minutes(DEFAULT_RETENTION_MINUTES),
            purchase_group_link: "https://t.me/yourpurchasegroup".to_string(),
            purchase_group_price: "₹99".to_string(),
            upi_id: "example@upi".to_string(),
            support_handle: "@stephinjk".to_string(),
            demo_media: None,
            database_path: None,
            reset_hour_utc: 0,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            health_addr: None,
            worker_idle: Duration::from_secs(15 * 60),
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("admins", &self.admins)
            .field("admin_group", &self.admin_group)
            .field("required_channel", &self.required_channel)
            .field("batch_size", &self.batch_size)
            .field("daily_cap", &self.daily_cap)
            .field("retention_minutes", &self.retention.num_minutes())
            .field("reset_hour_utc", &self.reset_hour_utc)
            .field("database_path", &self.database_path)
            .field("api_base_url", &self.api_base_url)
            .field("health_addr", &self.health_addr)
            .finish_non_exhaustive()
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.token = lookup("BOT_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        if let Some(raw) = lookup("ADMINS") {
            config.admins = parse_admins(&raw)?;
        }

        if let Some(raw) = lookup("ADMIN_GROUP_ID") {
            if !raw.trim().is_empty() {
                match raw.trim().parse::<i64>() {
                    Ok(id) => config.admin_group = Some(ChatId(id)),
                    Err(_) => tracing::warn!(value = %raw, "Invalid ADMIN_GROUP_ID, payment review disabled"),
                }
            }
        }

        if let Some(raw) = lookup("REQUIRED_CHANNEL") {
            config.required_channel = if raw.trim().is_empty() {
                None
            } else {
                Some(raw.parse::<ChatTarget>().map_err(|_| ConfigError::Invalid {
                    var: "REQUIRED_CHANNEL",
                    value: raw.clone(),
                })?)
            };
        }

        if let Some(n) = parse_positive::<usize, _>(&lookup, "VIDEO_BATCH_SIZE") {
            config.batch_size = n;
        }
        if let Some(n) = parse_positive::<u32, _>(&lookup, "DAILY_VIDEO_LIMIT") {
            config.daily_cap = n;
        }
        if let Some(n) = parse_positive::<i64, _>(&lookup, "MESSAGE_DELETE_MINUTES") {
            match chrono::Duration::try_minutes(n).filter(|_| n <= MAX_RETENTION_MINUTES) {
                Some(retention) => config.retention = retention,
                None => tracing::warn!(
                    value = n,
                    max = MAX_RETENTION_MINUTES,
                    "MESSAGE_DELETE_MINUTES out of range, using default"
                ),
            }
        }

        if let Some(v) = non_empty(&lookup, "PURCHASE_GROUP_LINK") {
            config.purchase_group_link = v;
        }
        if let Some(v) = non_empty(&lookup, "PURCHASE_GROUP_PRICE") {
            config.purchase_group_price = v;
        }
        if let Some(v) = non_empty(&lookup, "UPI_ID") {
            config.upi_id = v;
        }
        if let Some(v) = non_empty(&lookup, "SUPPORT_HANDLE") {
            config.support_handle = if v.starts_with('@') { v } else { format!("@{v}") };
        }
        config.demo_media = non_empty(&lookup, "DEMO_MEDIA");
        config.database_path = non_empty(&lookup, "DATABASE_PATH").map(PathBuf::from);

        if let Some(raw) = lookup("RESET_HOUR_UTC") {
            match raw.trim().parse::<u32>() {
                Ok(h) if h < 24 => config.reset_hour_utc = h,
                _ => tracing::warn!(value = %raw, "Invalid RESET_HOUR_UTC, using midnight"),
            }
        }

        if let Some(v) = non_empty(&lookup, "API_BASE_URL") {
            config.api_base_url = v;
        }

        if let Some(raw) = non_empty(&lookup, "HEALTH_ADDR") {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => config.health_addr = Some(addr),
                Err(_) => tracing::warn!(value = %raw, "Invalid HEALTH_ADDR, health API disabled"),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        Ok(config)
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }

    /// Public link to the required channel, when it has one.
    pub fn required_channel_link(&self) -> Option<String> {
        self.required_channel.as_ref().and_then(ChatTarget::public_link)
    }
}

fn parse_admins(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map(UserId).map_err(|_| ConfigError::Invalid {
                var: "ADMINS",
                value: s.to_string(),
            })
        })
        .collect()
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_positive<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    F: Fn(&str) -> Option<String>,
{
    let raw = non_empty(lookup, key)?;
    match raw.parse::<T>() {
        Ok(n) if n > T::default() => Some(n),
        _ => {
            tracing::warn!(var = key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
