//! Chaotic store wrapper for fault injection testing
//!
//! Wraps another [`LineStore`] and fails operations with a configured
//! probability. The failure is reported before the inner store is touched,
//! so a failed mutation never changes a table.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use crate::{LineStore, StoreError};

/// Store wrapper that randomly injects I/O failures.
///
/// Clones share the RNG and the counters.
#[derive(Clone)]
pub struct ChaoticStore<S: LineStore> {
    inner: S,
    chaos: Arc<Mutex<Chaos>>,
    operations: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

struct Chaos {
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: ChaoticRng,
}

/// Linear congruential generator, reproducible per seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: LineStore> ChaoticStore<S> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert_rate(failure_rate);
        Self {
            inner,
            chaos: Arc::new(Mutex::new(Chaos { failure_rate, rng: ChaoticRng { state: seed } })),
            operations: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change the failure rate for subsequent operations.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn set_failure_rate(&self, failure_rate: f64) {
        assert_rate(failure_rate);
        self.chaos.lock().unwrap_or_else(PoisonError::into_inner).failure_rate = failure_rate;
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of operations attempted.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::Relaxed)
    }

    /// Number of operations that were failed on purpose.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn roll(&self) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        let mut chaos = self.chaos.lock().unwrap_or_else(PoisonError::into_inner);
        let rate = chaos.failure_rate;
        if chaos.rng.next() < rate {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

fn assert_rate(failure_rate: f64) {
    assert!(
        (0.0..=1.0).contains(&failure_rate),
        "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
    );
}

impl<S: LineStore> LineStore for ChaoticStore<S> {
    fn ensure_exists(&self, table: &str) -> Result<(), StoreError> {
        self.roll()?;
        self.inner.ensure_exists(table)
    }

    fn append(&self, table: &str, line: &str) -> Result<(), StoreError> {
        self.roll()?;
        self.inner.append(table, line)
    }

    fn read(&self, table: &str, n: usize) -> Result<String, StoreError> {
        self.roll()?;
        self.inner.read(table, n)
    }

    fn read_all(&self, table: &str) -> Result<Vec<String>, StoreError> {
        self.roll()?;
        self.inner.read_all(table)
    }

    fn overwrite(&self, table: &str, n: usize, line: &str) -> Result<(), StoreError> {
        self.roll()?;
        self.inner.overwrite(table, n, line)
    }

    fn delete_range(&self, table: &str, start: usize, end: usize) -> Result<usize, StoreError> {
        self.roll()?;
        self.inner.delete_range(table, start, end)
    }

    fn truncate(&self, table: &str) -> Result<(), StoreError> {
        self.roll()?;
        self.inner.truncate(table)
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        self.roll()?;
        self.inner.count(table)
    }
}
