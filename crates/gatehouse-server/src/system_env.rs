//! Production environment.
//!
//! `SystemEnv` reads the host's local wall clock through chrono and the
//! available memory through sysinfo, and sleeps on the tokio timer. Clock
//! synchronization is left to the host (NTP), so the nightly resync only
//! records that it happened.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{Local, NaiveDateTime};
use gatehouse_core::env::Environment;
use sysinfo::System;

/// Production environment backed by the host.
#[derive(Clone)]
pub struct SystemEnv {
    system: Arc<Mutex<System>>,
}

impl SystemEnv {
    /// Create a new system environment.
    pub fn new() -> Self {
        Self { system: Arc::new(Mutex::new(System::new())) }
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SystemEnv {
    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn free_memory(&self) -> u64 {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();
        system.available_memory()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn resync_clock(&self) -> impl Future<Output = ()> + Send {
        tracing::debug!(now = %self.local_now(), "wall clock is kept by the host");
        std::future::ready(())
    }
}
