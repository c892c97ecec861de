//! Server configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```toml
//! data_dir = "/var/lib/gatehouse"
//!
//! [collector]
//! url = "https://collector.example/api.php"
//! timeout_secs = 10
//!
//! [access]
//! key_length = 16
//! max_keys = 40
//! max_devices = 40
//!
//! [log]
//! ceiling = 200
//! item_len = 200
//! queue_len = 20
//!
//! [sync]
//! safety_factor = 4
//! record_footprint = 290
//! max_batch = 200
//!
//! [radio]
//! queue_len = 50
//! channel = 10
//! master_address = "AAAAA"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use gatehouse_core::{
    access::AccessConfig, logbook::LogConfig, radio::RadioConfig, sync::SyncConfig,
};
use serde::{Deserialize, Serialize};

use crate::ServerError;

/// Where log batches are uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Endpoint receiving `POST`ed JSON batches.
    pub url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { url: "http://127.0.0.1:8080/api.php".to_string(), timeout_secs: 10 }
    }
}

impl CollectorConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Full server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `keys.txt`, `devices.txt` and `logs.txt`.
    pub data_dir: PathBuf,
    /// Remote log collector.
    pub collector: CollectorConfig,
    /// Access table limits.
    pub access: AccessConfig,
    /// Activity log sizing.
    pub log: LogConfig,
    /// Upload batch sizing.
    pub sync: SyncConfig,
    /// Radio settings.
    pub radio: RadioConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            collector: CollectorConfig::default(),
            access: AccessConfig::default(),
            log: LogConfig::default(),
            sync: SyncConfig::default(),
            radio: RadioConfig::default(),
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ServerError> {
        toml::from_str(text).map_err(|err| ServerError::Config(err.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| ServerError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml(&text)
    }
}
