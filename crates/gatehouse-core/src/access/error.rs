use gatehouse_store::StoreError;
use thiserror::Error;

use crate::ErrorKind;

/// Errors from the access tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Identifier or level out of format.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Table already holds its maximum number of entries.
    #[error("{kind} table is full ({capacity} entries)")]
    Capacity {
        /// "key" or "device"
        kind: &'static str,
        /// Table capacity
        capacity: usize,
    },

    /// Identifier already present.
    #[error("{kind} {id} already exists")]
    Duplicate {
        /// "key" or "device"
        kind: &'static str,
        /// Offending identifier
        id: String,
    },

    /// Identifier not present.
    #[error("{kind} {id} not found")]
    NotFound {
        /// "key" or "device"
        kind: &'static str,
        /// Missing identifier
        id: String,
    },

    /// A persisted line failed validation at startup.
    #[error("malformed record in {table} line {line}: {reason}")]
    MalformedRecord {
        /// Table name
        table: &'static str,
        /// 1-based line
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// The store rejected the change; tables are unchanged.
    #[error("access storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AccessError {
    pub(crate) fn invalid(reason: String) -> Self {
        Self::InvalidInput(reason)
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::MalformedRecord { .. } => ErrorKind::InvalidInput,
            Self::Capacity { .. } => ErrorKind::Capacity,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::StorageFailure,
        }
    }
}
