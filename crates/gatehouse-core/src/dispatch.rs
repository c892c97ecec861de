//! Commands from the operator front-ends.
//!
//! The TCP and HTTPS front-ends parse requests into a [`ServiceCommand`] and
//! hand it to [`ControlPlane::dispatch`]. The numeric codes used on the wire
//! for access-level changes convert with `TryFrom<u8>`.

use std::sync::Arc;

use gatehouse_store::LineStore;
use thiserror::Error;

use crate::{
    ErrorKind,
    access::{AccessControl, AccessError},
    env::Environment,
    logbook::LogSubmitter,
    radio::{RadioCommand, RadioError, RadioHandle},
    sync::{Collector, SyncClient, SyncError, SyncReport},
};

/// Log tag of entries written for received commands.
pub const SERVICE_TAG: &str = "SERVICE";

/// Which table an access-level command addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTarget {
    /// A device by number.
    Device(u8),
    /// A key by identifier.
    Key(String),
}

/// What an access-level command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    /// Change the level of an existing entry (wire code 0).
    Modify,
    /// Add a new entry (wire code 1).
    Add,
    /// Remove an entry; the level is ignored (wire code 2).
    Delete,
}

impl TryFrom<u8> for AccessOp {
    type Error = DispatchError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Modify),
            1 => Ok(Self::Add),
            2 => Ok(Self::Delete),
            other => Err(DispatchError::InvalidInput(format!("unknown change type {other}"))),
        }
    }
}

/// A front-end command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCommand {
    /// Switch one device, or every device when `device` is 0.
    Toggle {
        /// Device number, 0 for all
        device: u8,
        /// Target state
        on: bool,
    },
    /// Health-check one device.
    Ping {
        /// Device number
        device: u8,
    },
    /// Upload the log now and purge what was accepted.
    Sync,
    /// Add, modify or delete a key or device.
    AccessLevel {
        /// Addressed entry
        target: AccessTarget,
        /// Operation
        op: AccessOp,
        /// New level (ignored for `Delete`)
        level: u8,
    },
}

impl ServiceCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Toggle { on: true, .. } => "TURNON",
            Self::Toggle { on: false, .. } => "TURNOFF",
            Self::Ping { .. } => "PING",
            Self::Sync => "SYNC",
            Self::AccessLevel { .. } => "ACCESSLEVEL",
        }
    }
}

/// Result of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Number of radio commands queued.
    Queued(usize),
    /// Sync ran; check the report status for completeness.
    Synced(SyncReport),
    /// Access tables updated.
    Updated,
}

/// Errors from dispatching a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Malformed command.
    #[error("invalid command: {0}")]
    InvalidInput(String),

    /// Radio queue refused the command.
    #[error(transparent)]
    Radio(#[from] RadioError),

    /// Access table change failed.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Sync aborted.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl DispatchError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Radio(err) => err.kind(),
            Self::Access(err) => err.kind(),
            Self::Sync(err) => err.kind(),
        }
    }
}

/// Executes front-end commands against the components.
pub struct ControlPlane<S: LineStore, C: Collector, E: Environment> {
    access: Arc<AccessControl<S>>,
    radio: RadioHandle,
    sync: Arc<SyncClient<S, C, E>>,
    logs: LogSubmitter<E>,
}

impl<S: LineStore, C: Collector, E: Environment> ControlPlane<S, C, E> {
    /// Wire the control plane to its components.
    pub fn new(
        access: Arc<AccessControl<S>>,
        radio: RadioHandle,
        sync: Arc<SyncClient<S, C, E>>,
        logs: LogSubmitter<E>,
    ) -> Self {
        Self { access, radio, sync, logs }
    }

    /// The authorizer, for read-only front-end queries.
    pub fn access(&self) -> &AccessControl<S> {
        &self.access
    }

    /// Execute `command` on behalf of `requester` (a front-end user id).
    pub async fn dispatch(
        &self,
        requester: u32,
        command: ServiceCommand,
    ) -> Result<Dispatched, DispatchError> {
        self.logs.submit_or_warn(
            SERVICE_TAG,
            &format!("{} message received from ID: {requester}", command.name()),
        );

        match command {
            ServiceCommand::Toggle { device: 0, on } => Ok(Dispatched::Queued(self.toggle_all(on))),
            ServiceCommand::Toggle { device, on } => {
                self.radio.send(RadioCommand::Toggle { device, on })?;
                Ok(Dispatched::Queued(1))
            },
            ServiceCommand::Ping { device } => {
                self.radio.send(RadioCommand::Ping { device })?;
                Ok(Dispatched::Queued(1))
            },
            ServiceCommand::Sync => Ok(Dispatched::Synced(self.sync.sync_all(true).await?)),
            ServiceCommand::AccessLevel { target, op, level } => {
                self.change_access(&target, op, level)?;
                Ok(Dispatched::Updated)
            },
        }
    }

    /// Queue a toggle for every known device. Per-device failures are
    /// logged and skipped.
    fn toggle_all(&self, on: bool) -> usize {
        let mut queued = 0;
        for device in self.access.list_devices() {
            match self.radio.send(RadioCommand::Toggle { device: device.id, on }) {
                Ok(()) => queued += 1,
                Err(err) => tracing::error!(device = device.id, %err, "failed to queue toggle"),
            }
        }
        queued
    }

    fn change_access(
        &self,
        target: &AccessTarget,
        op: AccessOp,
        level: u8,
    ) -> Result<(), AccessError> {
        match (target, op) {
            (AccessTarget::Device(id), AccessOp::Modify) => {
                self.access.change_device_access_level(*id, level)
            },
            (AccessTarget::Device(id), AccessOp::Add) => self.access.add_device(*id, level),
            (AccessTarget::Device(id), AccessOp::Delete) => self.access.delete_device(*id),
            (AccessTarget::Key(id), AccessOp::Modify) => {
                self.access.change_key_access_level(id, level)
            },
            (AccessTarget::Key(id), AccessOp::Add) => self.access.add_key(id, level),
            (AccessTarget::Key(id), AccessOp::Delete) => self.access.delete_key(id),
        }
    }
}
