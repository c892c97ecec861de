//! Single-slot transmission state machine.
//!
//! ```text
//!            transmit(cmd)
//!   Idle ────────────────────> Sending
//!    ^                           │
//!    │   TX_DS (acknowledged)    │
//!    ├───────────────────────────┤
//!    │   MAX_RT (retries spent)  │
//!    └───────────────────────────┘
//! ```
//!
//! At most one command is in flight. Its payload is kept in the slot until
//! the interrupt that ends the transmission, so the TX_DS outcome can hand
//! the payload (with the delivery marker) to the message handler.

use super::{
    RadioError,
    transceiver::{StatusBit, Transceiver},
    wire::{ACK_MARKER, MARKER_POS, Payload, RadioCommand, tx_address},
};

/// Link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No transmission pending; the radio is listening.
    Idle,
    /// A transmission is waiting for TX_DS or MAX_RT.
    Sending,
}

/// What one serviced interrupt turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// RX_DR: a payload arrived.
    Received(Payload),
    /// TX_DS: the in-flight command was acknowledged. `echo` is its payload
    /// with the delivery marker set.
    TxAcknowledged {
        /// Command that was delivered
        command: RadioCommand,
        /// Payload with `X` at byte 15
        echo: Payload,
    },
    /// MAX_RT: the in-flight command was dropped.
    RetryExhausted(RadioCommand),
    /// TX_DS or MAX_RT with nothing in flight.
    Orphaned(StatusBit),
    /// No status bit set.
    Spurious,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    command: RadioCommand,
    payload: Payload,
}

/// Transceiver plus the in-flight slot.
pub struct RadioLink<T: Transceiver> {
    transceiver: T,
    in_flight: Option<InFlight>,
}

impl<T: Transceiver> RadioLink<T> {
    /// Wrap an already configured transceiver.
    pub fn new(transceiver: T) -> Self {
        Self { transceiver, in_flight: None }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        if self.in_flight.is_some() { LinkState::Sending } else { LinkState::Idle }
    }

    /// The command waiting for completion, if any.
    pub fn in_flight(&self) -> Option<RadioCommand> {
        self.in_flight.map(|slot| slot.command)
    }

    /// Access to the transceiver.
    pub fn transceiver(&self) -> &T {
        &self.transceiver
    }

    /// Send `command` to its device.
    ///
    /// # Errors
    ///
    /// `Busy` while another command is in flight. A failure after the slot
    /// was claimed releases it again.
    pub fn transmit(&mut self, command: RadioCommand) -> Result<(), RadioError> {
        if self.in_flight.is_some() {
            return Err(RadioError::Busy);
        }
        let payload = command.payload()?;
        self.transceiver.set_tx_address(tx_address(command.device())?)?;

        self.in_flight = Some(InFlight { command, payload });
        if let Err(err) = self.transceiver.transmit(&payload) {
            self.in_flight = None;
            return Err(err);
        }
        tracing::debug!(?command, "transmitting");
        Ok(())
    }

    /// Handle one interrupt: read status and act on the highest-priority
    /// cause (RX_DR, then TX_DS, then MAX_RT). Lower-priority causes stay
    /// latched for the next call.
    pub fn service_interrupt(&mut self) -> Result<InterruptOutcome, RadioError> {
        let status = self.transceiver.status()?;

        if status.rx_ready {
            let payload = self.transceiver.read_payload()?;
            self.transceiver.clear(StatusBit::RxReady)?;
            return Ok(InterruptOutcome::Received(payload));
        }

        if status.tx_sent {
            let slot = self.in_flight.take();
            self.transceiver.clear(StatusBit::TxSent)?;
            self.transceiver.power_up_rx()?;
            return Ok(match slot {
                Some(InFlight { command, mut payload }) => {
                    payload[MARKER_POS] = ACK_MARKER;
                    InterruptOutcome::TxAcknowledged { command, echo: payload }
                },
                None => InterruptOutcome::Orphaned(StatusBit::TxSent),
            });
        }

        if status.max_retries {
            let slot = self.in_flight.take();
            self.transceiver.clear(StatusBit::MaxRetries)?;
            self.transceiver.power_up_rx()?;
            return Ok(match slot {
                Some(InFlight { command, .. }) => InterruptOutcome::RetryExhausted(command),
                None => InterruptOutcome::Orphaned(StatusBit::MaxRetries),
            });
        }

        Ok(InterruptOutcome::Spurious)
    }

    /// Whether another interrupt cause is still latched.
    pub fn pending(&mut self) -> Result<bool, RadioError> {
        Ok(self.transceiver.status()?.any())
    }
}
