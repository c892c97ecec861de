use thiserror::Error;

use super::wire::WireError;
use crate::ErrorKind;

/// Errors from the radio link and its queues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    /// Message could not be encoded or decoded.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A transmission is already in flight.
    #[error("radio busy: a transmission is in flight")]
    Busy,

    /// The radio queue is full.
    #[error("radio queue is full")]
    QueueFull,

    /// The radio task has stopped.
    #[error("radio task has stopped")]
    Closed,

    /// Bad radio configuration.
    #[error("invalid radio configuration: {0}")]
    Config(String),

    /// The transceiver reported a failure.
    #[error("transceiver error: {0}")]
    Hardware(String),
}

impl RadioError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Wire(err) => err.kind(),
            Self::Busy => ErrorKind::Busy,
            Self::QueueFull => ErrorKind::QueueFull,
            Self::Closed => ErrorKind::Closed,
            Self::Config(_) => ErrorKind::InvalidInput,
            Self::Hardware(_) => ErrorKind::ProtocolAnomaly,
        }
    }
}
