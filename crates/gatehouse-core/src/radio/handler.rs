use std::sync::Arc;

use crossbeam_channel::Receiver;
use gatehouse_store::LineStore;

use super::{
    RadioError, RadioHandle,
    wire::{Payload, RadioCommand, Report, credential_id},
};
use crate::{access::AccessControl, env::Environment, logbook::LogSubmitter};

/// Log tag of entries written by the message handler.
pub const HANDLER_TAG: &str = "NRF_MESSAGE_HANDLER";

/// What the handler did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Credential authorized; a toggle-on was queued.
    Granted {
        /// Requesting device
        device: u8,
        /// Credential as key identifier
        key: String,
    },
    /// Credential refused or unknown; a toggle-off was queued.
    Denied {
        /// Requesting device
        device: u8,
        /// Credential as key identifier
        key: String,
    },
    /// A toggle we sent was delivered.
    ToggleDelivered {
        /// Destination device
        device: u8,
        /// Requested state
        on: bool,
    },
    /// Device reported healthy.
    PingOk {
        /// Reporting device
        device: u8,
    },
    /// Device reported an error code.
    PingFailed {
        /// Reporting device
        device: u8,
        /// Error code
        status: u8,
    },
    /// A ping we sent was delivered.
    PingDelivered {
        /// Destination device
        device: u8,
    },
}

/// Interprets payloads from the message queue.
///
/// Access requests are answered over the radio; delivery echoes and health
/// reports are written to the activity log.
pub struct MessageHandler<S: LineStore, E: Environment> {
    access: Arc<AccessControl<S>>,
    radio: RadioHandle,
    logs: LogSubmitter<E>,
}

impl<S: LineStore, E: Environment> MessageHandler<S, E> {
    /// Create a handler answering through `radio`.
    pub fn new(access: Arc<AccessControl<S>>, radio: RadioHandle, logs: LogSubmitter<E>) -> Self {
        Self { access, radio, logs }
    }

    /// Handle payloads until the radio task drops the message queue.
    pub fn run(self, messages: Receiver<Payload>) {
        for payload in messages {
            if let Err(err) = self.handle(&payload) {
                tracing::warn!(
                    %err,
                    payload = %String::from_utf8_lossy(&payload),
                    "invalid radio message"
                );
            }
        }
        tracing::info!("message handler stopped");
    }

    /// Interpret one payload.
    ///
    /// # Errors
    ///
    /// `Wire` for an unknown type or a malformed device number.
    pub fn handle(&self, payload: &Payload) -> Result<Handled, RadioError> {
        let handled = match Report::decode(payload)? {
            Report::AccessRequest { device, credential } => {
                let key = credential_id(&credential);
                self.answer_access(device, key)
            },
            Report::ToggleDelivered { device, on } => {
                let state = if on { "TURNON" } else { "TURNOFF" };
                self.logs
                    .submit_or_warn(HANDLER_TAG, &format!("sending {state} to device: {device}"));
                Handled::ToggleDelivered { device, on }
            },
            Report::Ping { device, status: 1 } => {
                tracing::info!(device, "ping successful");
                self.logs.submit_or_warn(
                    HANDLER_TAG,
                    &format!("received PING from device: {device}, successful"),
                );
                Handled::PingOk { device }
            },
            Report::Ping { device, status } => {
                tracing::warn!(device, status, "ping reported an error");
                self.logs.submit_or_warn(
                    HANDLER_TAG,
                    &format!("received PING from device: {device}, error code: {status}"),
                );
                Handled::PingFailed { device, status }
            },
            Report::PingDelivered { device } => {
                tracing::debug!(device, "ping delivered");
                self.logs.submit_or_warn(HANDLER_TAG, &format!("sending PING to device: {device}"));
                Handled::PingDelivered { device }
            },
        };
        Ok(handled)
    }

    fn answer_access(&self, device: u8, key: String) -> Handled {
        let granted = match self.access.authorize(device, &key) {
            Ok(granted) => granted,
            Err(err) => {
                tracing::debug!(device, %key, %err, "authorization lookup failed");
                false
            },
        };

        if granted {
            tracing::info!(device, %key, "access granted");
        } else {
            tracing::warn!(device, %key, "access denied");
        }

        if let Err(err) = self.radio.send(RadioCommand::Toggle { device, on: granted }) {
            tracing::error!(device, %err, "failed to queue access reply");
        }

        if granted { Handled::Granted { device, key } } else { Handled::Denied { device, key } }
    }
}
