//! Environment abstraction for deterministic testing.
//!
//! Decouples component logic from system resources (local wall clock, free
//! memory, sleeping). Production uses the real clock and memory probe; tests
//! use [`ManualEnv`], whose clock only moves when told to or when something
//! sleeps on it.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{NaiveDateTime, TimeDelta};

/// Abstract environment providing local time, memory and async sleep.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current local wall-clock time.
    ///
    /// Unlike a monotonic clock this may jump when the clock is
    /// re-synchronized.
    fn local_now(&self) -> NaiveDateTime;

    /// Bytes of memory currently available to the process.
    ///
    /// Used to size sync batches.
    fn free_memory(&self) -> u64;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Re-synchronize the wall clock with an external time source.
    ///
    /// Called once per day after the nightly sync. Environments without a
    /// time source do nothing.
    fn resync_clock(&self) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }
}

/// Hand-driven environment for tests and simulation.
///
/// `sleep` returns immediately and advances the clock by the requested
/// duration. Clones share state.
#[derive(Debug, Clone)]
pub struct ManualEnv {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now: NaiveDateTime,
    free_memory: u64,
    sleeps: Vec<Duration>,
    resyncs: usize,
}

impl ManualEnv {
    /// Environment starting at `now` with 1 MiB of free memory.
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now,
                free_memory: 1 << 20,
                sleeps: Vec::new(),
                resyncs: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the wall clock.
    pub fn set_now(&self, now: NaiveDateTime) {
        self.lock().now = now;
    }

    /// Move the wall clock forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        if let Some(next) =
            TimeDelta::from_std(by).ok().and_then(|delta| state.now.checked_add_signed(delta))
        {
            state.now = next;
        }
    }

    /// Set the value reported by `free_memory`.
    pub fn set_free_memory(&self, bytes: u64) {
        self.lock().free_memory = bytes;
    }

    /// Every duration slept so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// How many times the clock was re-synchronized.
    pub fn resync_count(&self) -> usize {
        self.lock().resyncs
    }
}

impl Environment for ManualEnv {
    fn local_now(&self) -> NaiveDateTime {
        self.lock().now
    }

    fn free_memory(&self) -> u64 {
        self.lock().free_memory
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.lock().sleeps.push(duration);
        self.advance(duration);
        std::future::ready(())
    }

    fn resync_clock(&self) -> impl Future<Output = ()> + Send {
        self.lock().resyncs += 1;
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10).and_then(|d| d.and_hms_opt(h, m, s)).expect("valid")
    }

    #[tokio::test]
    async fn sleeping_advances_manual_clock() {
        let env = ManualEnv::new(at(23, 59, 0));

        env.sleep(Duration::from_secs(90)).await;

        assert_eq!(env.local_now(), at(0, 0, 30) + TimeDelta::days(1));
        assert_eq!(env.sleeps(), vec![Duration::from_secs(90)]);
    }

    #[test]
    fn clones_share_state() {
        let env = ManualEnv::new(at(12, 0, 0));
        let other = env.clone();

        other.set_free_memory(4096);
        other.advance(Duration::from_secs(1));

        assert_eq!(env.free_memory(), 4096);
        assert_eq!(env.local_now(), at(12, 0, 1));
    }
}
