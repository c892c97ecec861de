//! Server error types.

use gatehouse_core::{access::AccessError, logbook::LogError, radio::RadioError};
use gatehouse_store::StoreError;
use thiserror::Error;

/// Errors that stop the server from starting or shutting down cleanly.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error (unreadable file, bad TOML, invalid collector
    /// URL).
    ///
    /// Fatal at startup. Fix the configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// The data directory could not be opened.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The access tables failed to load, e.g. a malformed record.
    ///
    /// Fatal: the tables are never repaired automatically.
    #[error("access tables: {0}")]
    Access(#[from] AccessError),

    /// The log table failed to load.
    #[error("log table: {0}")]
    Log(#[from] LogError),

    /// The radio could not be configured.
    #[error("radio: {0}")]
    Radio(#[from] RadioError),

    /// Spawning a worker or waiting for a signal failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker panicked before shutdown completed.
    #[error("worker {0} panicked")]
    WorkerPanicked(&'static str),
}
