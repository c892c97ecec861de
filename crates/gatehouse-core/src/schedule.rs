//! Nightly sync-and-purge.
//!
//! ```text
//!   sleep until local midnight ──> sync_all(delete) ──> sleep guard ──> resync clock ─┐
//!        ^                                                                            │
//!        └────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard interval keeps a clock that lands slightly before midnight
//! after resync from triggering a second run the same night.

use std::{sync::Arc, time::Duration};

use chrono::{NaiveTime, Timelike};
use gatehouse_store::LineStore;

use crate::{
    env::Environment,
    sync::{Collector, SyncClient, SyncReport},
};

/// Default pause after each nightly run.
pub const MIDNIGHT_GUARD: Duration = Duration::from_secs(120);

/// Seconds from `now` until the next local midnight, in `1..=86400`.
pub fn seconds_until_midnight(now: NaiveTime) -> u64 {
    let (h, m, s) = (u64::from(now.hour()), u64::from(now.minute()), u64::from(now.second()));
    (23 - h) * 3600 + (59 - m) * 60 + (60 - s.min(59))
}

/// Long-lived task running one sync-and-purge per night.
pub struct DailySync<S: LineStore, C: Collector, E: Environment> {
    client: Arc<SyncClient<S, C, E>>,
    env: E,
    guard: Duration,
}

impl<S: LineStore, C: Collector, E: Environment> DailySync<S, C, E> {
    /// Schedule nightly runs of `client`.
    pub fn new(client: Arc<SyncClient<S, C, E>>, env: E, guard: Duration) -> Self {
        Self { client, env, guard }
    }

    /// One night: wait for midnight, sync with delete, wait out the guard,
    /// resync the clock.
    ///
    /// Returns the sync report, or `None` if the run aborted.
    pub async fn cycle(&self) -> Option<SyncReport> {
        let wait = seconds_until_midnight(self.env.local_now().time());
        tracing::debug!(wait_secs = wait, "sleeping until midnight");
        self.env.sleep(Duration::from_secs(wait)).await;

        let report = match self.client.sync_all(true).await {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::error!(%err, "nightly log sync failed");
                None
            },
        };

        self.env.sleep(self.guard).await;
        self.env.resync_clock().await;
        report
    }

    /// Run nightly forever. Stopped by dropping or aborting the task.
    pub async fn run(self) {
        loop {
            self.cycle().await;
        }
    }
}
