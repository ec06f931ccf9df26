//! Recurring lifecycle jobs: expiry sweep, daily quota reset, roster refresh
//! and inactive-user pruning.
//!
//! Each job is a plain method returning a small report so it can be driven
//! directly from tests; [`Scheduler::spawn`] wires them to timers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use sluice_gateway::{Gateway, SendOptions};
use sluice_shared::constants::PROBE_TEXT;
use sluice_shared::ChatTarget;
use sluice_store::Store;

use crate::error::Result;
use crate::roster::Roster;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const ROSTER_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub users: usize,
    pub deleted: usize,
    pub failed: usize,
    pub pulled: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub probed: usize,
    pub pruned: usize,
}

#[derive(Clone)]
pub struct Scheduler {
    store: Store,
    gateway: Arc<dyn Gateway>,
    roster: Roster,
    reset_hour_utc: u32,
}

impl Scheduler {
    pub fn new(store: Store, gateway: Arc<dyn Gateway>, roster: Roster, reset_hour_utc: u32) -> Self {
        Self {
            store,
            gateway,
            roster,
            reset_hour_utc,
        }
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Delete every message due at or before `now`, then drop the due
    /// entries. Gateway failures are logged and never retried.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let due = self
            .store
            .with(|db| db.find_users_with_due_messages(now))?;
        let mut report = SweepReport {
            users: due.len(),
            ..SweepReport::default()
        };

        for (user, entries) in due {
            for entry in &entries {
                match self.gateway.delete_message(entry.message).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::debug!(
                            user = %user,
                            chat = %entry.message.chat_id,
                            error = %e,
                            "scheduled delete failed"
                        );
                    }
                }
            }
            report.pulled += self.store.with(|db| db.pull_due_messages(user, now))?;
        }

        if report.users > 0 {
            tracing::info!(
                users = report.users,
                deleted = report.deleted,
                failed = report.failed,
                "expired messages swept"
            );
        }
        Ok(report)
    }

    pub fn reset_daily_quotas(&self, now: DateTime<Utc>) -> Result<usize> {
        let count = self.store.with(|db| db.reset_all_daily_counts(now))?;
        tracing::info!(users = count, "daily quotas reset");
        Ok(count)
    }

    pub async fn refresh_roster(&self) -> Result<usize> {
        let count = self.roster.reload(&self.store).await?;
        tracing::debug!(channels = count, "channel roster refreshed");
        Ok(count)
    }

    /// Probe every user silently; delete those the platform reports as
    /// definitively unreachable.
    pub async fn prune_inactive_users(&self) -> Result<PruneReport> {
        let ids = self.store.with(|db| db.find_user_ids())?;
        let mut report = PruneReport::default();
        let probe = SendOptions {
            silent: true,
            ..SendOptions::default()
        };

        for id in ids {
            report.probed += 1;
            match self
                .gateway
                .send_text(&ChatTarget::from(id), PROBE_TEXT, &probe)
                .await
            {
                Ok(message) => {
                    if let Err(e) = self.gateway.delete_message(message).await {
                        tracing::debug!(user = %id, error = %e, "could not remove probe message");
                    }
                }
                Err(e) if e.is_unreachable() => {
                    if self.store.with(|db| db.delete_user(id))? {
                        report.pruned += 1;
                        tracing::info!(user = %id, reason = %e, "inactive user removed");
                    }
                }
                Err(e) => {
                    tracing::debug!(user = %id, error = %e, "probe failed transiently, keeping user");
                }
            }
        }

        tracing::info!(probed = report.probed, pruned = report.pruned, "inactive user pruning done");
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Start the three timer loops. Each stops once `shutdown` flips to
    /// `true`; a run already in progress finishes first.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let this = Arc::new(self);
        vec![
            tokio::spawn(Self::sweep_loop(this.clone(), shutdown.clone())),
            tokio::spawn(Self::roster_loop(this.clone(), shutdown.clone())),
            tokio::spawn(Self::daily_loop(this, shutdown)),
        ]
    }

    async fn sweep_loop(this: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }
            if let Err(e) = this.sweep_expired(Utc::now()).await {
                tracing::error!(error = %e, "expiry sweep failed");
            }
        }
        tracing::debug!("sweep loop stopped");
    }

    async fn roster_loop(this: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        // The first tick fires immediately, which gives the load at start.
        let mut interval = tokio::time::interval(ROSTER_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }
            if let Err(e) = this.refresh_roster().await {
                tracing::error!(error = %e, "roster refresh failed");
            }
        }
        tracing::debug!("roster loop stopped");
    }

    async fn daily_loop(this: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let now = Utc::now();
            let next = next_daily_instant(now, this.reset_hour_utc);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next = %next, "next daily run scheduled");

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            if let Err(e) = this.reset_daily_quotas(Utc::now()) {
                tracing::error!(error = %e, "daily quota reset failed");
            }
            if let Err(e) = this.prune_inactive_users().await {
                tracing::error!(error = %e, "inactive user pruning failed");
            }
        }
        tracing::debug!("daily loop stopped");
    }
}

/// The next instant strictly after `now` at `hour`:00:00 UTC.
pub fn next_daily_instant(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let start_of_day = now
        - chrono::Duration::seconds(i64::from(now.num_seconds_from_midnight()))
        - chrono::Duration::nanoseconds(i64::from(now.nanosecond()));
    let today = start_of_day + chrono::Duration::hours(i64::from(hour.min(23)));
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_instant_today_or_tomorrow() {
        let before = Utc.with_ymd_and_hms(2024, 3, 10, 2, 30, 0).unwrap();
        assert_eq!(
            next_daily_instant(before, 4),
            Utc.with_ymd_and_hms(2024, 3, 10, 4, 0, 0).unwrap()
        );

        let after = Utc.with_ymd_and_hms(2024, 3, 10, 4, 0, 0).unwrap();
        assert_eq!(
            next_daily_instant(after, 4),
            Utc.with_ymd_and_hms(2024, 3, 11, 4, 0, 0).unwrap()
        );

        let year_end = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_daily_instant(year_end, 0),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn loops_stop_on_shutdown() {
        use sluice_gateway::RecordingGateway;

        let store = Store::open_in_memory().unwrap();
        let roster = Roster::new();
        let scheduler = Scheduler::new(store, Arc::new(RecordingGateway::new()), roster.clone(), 0);

        let (tx, rx) = watch::channel(false);
        let handles = scheduler.spawn(rx);

        // Let the immediate first ticks run.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(roster.snapshot().await, Some(Vec::new()));

        tx.send(true).unwrap();
        for h in handles {
            h.await.unwrap();
        }
    }
}
