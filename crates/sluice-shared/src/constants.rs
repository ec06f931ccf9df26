/// Application name
pub const APP_NAME: &str = "Sluice";

/// Content items delivered per batch request
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Items a non-premium user may receive per calendar day
pub const DEFAULT_DAILY_CAP: u32 = 30;

/// Minutes a delivered content message stays visible before the sweep removes it
pub const DEFAULT_RETENTION_MINUTES: i64 = 30;

/// Upper bound accepted for the retention setting (one year)
pub const MAX_RETENTION_MINUTES: i64 = 525_600;

/// Delay between consecutive items of one batch (milliseconds)
pub const BATCH_PACING_MS: u64 = 500;

/// Delay between consecutive broadcast sends (milliseconds)
pub const BROADCAST_PACING_MS: u64 = 100;

/// Seconds the demo preview stays visible
pub const DEMO_RETENTION_SECS: i64 = 20;

/// Delivery records listed in the revoke menu
pub const RECENT_BROADCAST_LIMIT: usize = 10;

/// Maximum callback data length accepted by the chat platform (bytes)
pub const CALLBACK_DATA_MAX: usize = 64;

/// Default required-membership channel
pub const DEFAULT_REQUIRED_CHANNEL: &str = "@awt_bots";

/// Default Bot API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Long-poll timeout for fetching updates (seconds)
pub const POLL_TIMEOUT_SECS: u64 = 30;

/// Text of the silent reachability probe (zero-width space)
pub const PROBE_TEXT: &str = "\u{200b}";
