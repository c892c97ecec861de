//! Gatehouse master node runtime.
//!
//! Wraps [`gatehouse_core`]'s components with real I/O: files under a data
//! directory, the host clock and memory probe, an HTTP collector and the
//! worker threads and tasks that keep everything moving.
//!
//! # Components
//!
//! - [`Gatehouse`]: starts and stops every worker
//! - [`Config`]: TOML configuration with defaults for every field
//! - [`HttpCollector`]: uploads log batches as JSON over HTTP(S)
//! - [`SystemEnv`]: production environment (local clock, free memory)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod collector;
mod config;
mod error;
mod runtime;
mod system_env;

pub use collector::HttpCollector;
pub use config::{CollectorConfig, Config};
pub use error::ServerError;
pub use runtime::Gatehouse;
pub use system_env::SystemEnv;
