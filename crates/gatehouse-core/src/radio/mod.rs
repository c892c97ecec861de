//! Interrupt-driven radio protocol.
//!
//! ```text
//!   IRQ pin ──fire()──┐
//!                     v
//!   RadioHandle ──> [radio queue: 50] ──> RadioTask ──> Transceiver
//!                                            │
//!                         RX payloads,       │
//!                         delivery echoes    v
//!                                   [message queue: 50] ──> MessageHandler
//!                                                              │
//!                              access reply (toggle on/off) <──┘
//! ```
//!
//! The interrupt handler only posts to the radio queue; all register access
//! happens on the radio task. The message handler runs on its own thread so
//! authorization never delays interrupt servicing.

mod error;
mod handler;
mod interrupt;
mod link;
mod simulated;
mod task;
mod transceiver;
pub mod wire;

pub use error::RadioError;
pub use handler::{HANDLER_TAG, Handled, MessageHandler};
pub use interrupt::InterruptLine;
pub use link::{InterruptOutcome, LinkState, RadioLink};
pub use simulated::{SimulatedTransceiver, TxOutcome};
pub use task::{RadioConfig, RadioHandle, RadioTask};
pub use transceiver::{Status, StatusBit, Transceiver};
pub use wire::{Payload, RadioCommand, RadioRequest, Report};

/// Bounded queue carrying payloads from the radio task to the message
/// handler.
pub fn message_queue(
    config: &RadioConfig,
) -> (crossbeam_channel::Sender<Payload>, crossbeam_channel::Receiver<Payload>) {
    crossbeam_channel::bounded(config.queue_len.max(1))
}
