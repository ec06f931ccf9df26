//! # sluice-bot
//!
//! The Sluice engines and their wiring: per-chat sessions, the access gate,
//! quota-gated batch distribution, broadcast fan-out with revocation, the
//! lifecycle scheduler, the per-chat dispatcher and the optional health API.

pub mod api;
pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod distribution;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod menus;
pub mod roster;
pub mod scheduler;
pub mod session;

pub use broadcast::{BroadcastReport, Broadcaster, Revocation};
pub use config::BotConfig;
pub use dispatch::Dispatcher;
pub use distribution::{check_quota, Batch, DistributionConfig, Distributor, QuotaDecision};
pub use error::{BotError, ConfigError, Result};
pub use gate::{AccessGate, Verdict};
pub use handlers::Bot;
pub use roster::Roster;
pub use scheduler::{PruneReport, Scheduler, SweepReport};
pub use session::{ComposeStage, Interpretation, Mode, Session};
