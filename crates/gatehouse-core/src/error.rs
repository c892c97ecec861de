//! Error taxonomy shared by every component.
//!
//! Each component has its own error enum; all of them classify into one
//! [`ErrorKind`] so front-ends can map failures to responses without knowing
//! which component produced them.

use std::fmt;

use gatehouse_store::StoreError;

/// Classification of a component error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed identifier, level, range or message.
    InvalidInput,
    /// Addressed key, device or line does not exist.
    NotFound,
    /// Entry already present.
    Duplicate,
    /// Table is at capacity.
    Capacity,
    /// A bounded queue is full.
    QueueFull,
    /// Composed log line exceeds the item size.
    TooLong,
    /// Persistent storage failed; prior state is intact.
    StorageFailure,
    /// Remote collector could not be reached.
    Unreachable,
    /// Remote collector answered with a non-success status.
    Rejected,
    /// Radio reported a state that matches no expected outcome.
    ProtocolAnomaly,
    /// The radio already has a transmission in flight.
    Busy,
    /// The receiving task has shut down.
    Closed,
}

impl ErrorKind {
    /// Short upper-case name, as used in operator responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::NotFound => "NOT_FOUND",
            Self::Duplicate => "DUPLICATE",
            Self::Capacity => "CAPACITY",
            Self::QueueFull => "QUEUE_FULL",
            Self::TooLong => "TOO_LONG",
            Self::StorageFailure => "STORAGE_FAILURE",
            Self::Unreachable => "UNREACHABLE",
            Self::Rejected => "REJECTED",
            Self::ProtocolAnomaly => "PROTOCOL_ANOMALY",
            Self::Busy => "BUSY",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&StoreError> for ErrorKind {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } | StoreError::MissingTable(_) => Self::NotFound,
            StoreError::InvalidRange { .. } | StoreError::InvalidInput(_) => Self::InvalidInput,
            StoreError::Io(_) => Self::StorageFailure,
        }
    }
}
