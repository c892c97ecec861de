//! Bounded activity log.
//!
//! Producers anywhere in the system call [`LogSubmitter::submit`], which
//! timestamps the entry and enqueues it without blocking. A single
//! [`LogConsumer`] drains the queue into the [`LogBook`], the sole writer of
//! the log table. Once the table holds `ceiling` lines the oldest line is
//! evicted before each append.
//!
//! ```text
//!   submit() ──try_send──> [queue: 20] ──recv──> LogConsumer ──record()──> logs.txt
//!                                                                 │
//!                                          SyncClient ──read/delete┘
//! ```

mod book;
mod error;
mod queue;

pub use book::{LogBatch, LogBook};
pub use error::LogError;
pub use queue::{LogConsumer, LogSubmitter, compose_line};
use serde::{Deserialize, Serialize};

/// Table holding one serialized entry per line.
pub const LOG_TABLE: &str = "logs.txt";

/// Timestamp layout of a log line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sizing of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Maximum number of lines kept in the table.
    pub ceiling: usize,
    /// Maximum length of one serialized line.
    pub item_len: usize,
    /// Capacity of the submission queue.
    pub queue_len: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { ceiling: 200, item_len: 200, queue_len: 20 }
    }
}

/// One log entry as shipped to the collector.
///
/// Serializes as `{"TAG": .., "date_time": .., "info": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Originating component
    #[serde(rename = "TAG")]
    pub tag: String,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub date_time: String,
    /// Free-form message
    pub info: String,
}

impl LogRecord {
    /// Parse a stored `tag,date_time,info` line.
    ///
    /// The message may itself contain commas. Lines with missing fields are
    /// kept with those fields empty so they can still be shipped.
    pub fn parse(line: &str) -> Self {
        let mut fields = line.splitn(3, ',');
        let mut next = || fields.next().unwrap_or_default().to_string();
        Self { tag: next(), date_time: next(), info: next() }
    }
}
