use gatehouse_store::StoreError;
use thiserror::Error;

use crate::ErrorKind;

/// Errors from the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// Tag or message not representable as one log line.
    #[error("invalid log entry: {0}")]
    InvalidInput(String),

    /// Composed line exceeds the item size. Nothing was enqueued.
    #[error("log line is {len} characters, limit is {max}")]
    TooLong {
        /// Length of the composed line
        len: usize,
        /// Item size
        max: usize,
    },

    /// Submission queue is full. Nothing was enqueued.
    #[error("log queue is full")]
    QueueFull,

    /// The consumer has shut down.
    #[error("log consumer has shut down")]
    Closed,

    /// Range outside `1..=count` or `start > end`.
    #[error("invalid log range {start}..={end} (log holds {count} lines)")]
    InvalidRange {
        /// First line
        start: usize,
        /// Last line
        end: usize,
        /// Current line count
        count: usize,
    },

    /// The store failed; the log is unchanged.
    #[error("log storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LogError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::InvalidRange { .. } => ErrorKind::InvalidInput,
            Self::TooLong { .. } => ErrorKind::TooLong,
            Self::QueueFull => ErrorKind::QueueFull,
            Self::Closed => ErrorKind::Closed,
            Self::Storage(err) => match ErrorKind::from(err) {
                ErrorKind::NotFound => ErrorKind::NotFound,
                _ => ErrorKind::StorageFailure,
            },
        }
    }

    /// Returns true if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueFull => true,
            Self::Storage(err) => err.is_transient(),
            _ => false,
        }
    }
}
