use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};

use super::{
    InterruptLine, RadioError,
    link::{InterruptOutcome, LinkState, RadioLink},
    transceiver::Transceiver,
    wire::{Payload, RadioCommand, RadioRequest},
};

/// Radio settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Capacity of the radio queue and of the message queue.
    pub queue_len: usize,
    /// RF channel.
    pub channel: u8,
    /// Our own five-character receive address.
    pub master_address: String,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self { queue_len: 50, channel: 10, master_address: "AAAAA".to_string() }
    }
}

impl RadioConfig {
    /// The receive address as raw bytes.
    pub fn rx_address(&self) -> Result<[u8; 5], RadioError> {
        <[u8; 5]>::try_from(self.master_address.as_bytes()).map_err(|_| {
            RadioError::Config(format!(
                "master address must be 5 bytes, got {:?}",
                self.master_address
            ))
        })
    }
}

/// Cloneable sender for radio commands.
#[derive(Debug, Clone)]
pub struct RadioHandle {
    tx: Sender<RadioRequest>,
}

impl RadioHandle {
    /// Queue a command without blocking.
    ///
    /// # Errors
    ///
    /// `Wire` for a command with no frame form (device outside 1-99),
    /// `QueueFull` or `Closed` from the queue.
    pub fn send(&self, command: RadioCommand) -> Result<(), RadioError> {
        let request = RadioRequest::Transmit(command);
        request.encode()?;
        self.post(request)
    }

    /// Ask the radio task to stop after the requests already queued.
    pub fn shutdown(&self) -> Result<(), RadioError> {
        self.post(RadioRequest::Shutdown)
    }

    fn post(&self, request: RadioRequest) -> Result<(), RadioError> {
        self.tx.try_send(request).map_err(|err| match err {
            TrySendError::Full(_) => RadioError::QueueFull,
            TrySendError::Disconnected(_) => RadioError::Closed,
        })
    }
}

/// The long-lived radio worker.
///
/// Owns the link and drains the radio queue: commands are transmitted one at
/// a time (later ones wait in a backlog while the slot is taken), interrupt
/// requests are serviced and their outcome forwarded to the message queue.
pub struct RadioTask<T: Transceiver> {
    link: RadioLink<T>,
    requests: Receiver<RadioRequest>,
    repost: Sender<RadioRequest>,
    interrupt: InterruptLine,
    messages: Sender<Payload>,
    backlog: VecDeque<RadioCommand>,
    backlog_cap: usize,
}

impl<T: Transceiver> RadioTask<T> {
    /// Configure `transceiver` and build the task, its command handle and
    /// the interrupt line to wire to the IRQ pin.
    ///
    /// Inbound payloads and delivery echoes go to `messages`.
    pub fn new(
        mut transceiver: T,
        config: &RadioConfig,
        messages: Sender<Payload>,
    ) -> Result<(Self, RadioHandle, InterruptLine), RadioError> {
        transceiver.configure(config.channel, config.rx_address()?)?;

        let queue_len = config.queue_len.max(1);
        let (tx, requests) = bounded(queue_len);
        let interrupt = InterruptLine::new(tx.clone());
        let task = Self {
            link: RadioLink::new(transceiver),
            requests,
            repost: tx.clone(),
            interrupt: interrupt.clone(),
            messages,
            backlog: VecDeque::with_capacity(queue_len),
            backlog_cap: queue_len,
        };
        tracing::info!(channel = config.channel, "radio ready");
        Ok((task, RadioHandle { tx }, interrupt))
    }

    /// The link, for inspection.
    pub fn link(&self) -> &RadioLink<T> {
        &self.link
    }

    /// Commands waiting for the in-flight slot.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Process requests until `Shutdown` arrives.
    pub fn run(mut self) {
        while let Ok(request) = self.requests.recv() {
            if !self.handle(request) {
                break;
            }
        }
        tracing::info!("radio task stopped");
    }

    /// Process every request currently queued without blocking. Returns the
    /// number processed.
    pub fn poll(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(request) = self.requests.try_recv() {
            processed += 1;
            if !self.handle(request) {
                break;
            }
        }
        processed
    }

    /// Process one request. Returns `false` on `Shutdown`.
    pub fn handle(&mut self, request: RadioRequest) -> bool {
        match request {
            RadioRequest::Transmit(command) => self.transmit(command),
            RadioRequest::Interrupt => self.service(),
            RadioRequest::Shutdown => return false,
        }
        true
    }

    fn transmit(&mut self, command: RadioCommand) {
        if self.link.state() == LinkState::Sending {
            if self.backlog.len() >= self.backlog_cap {
                tracing::warn!(?command, "radio backlog full, command dropped");
            } else {
                self.backlog.push_back(command);
            }
            return;
        }
        if let Err(err) = self.link.transmit(command) {
            tracing::warn!(?command, %err, "failed to transmit");
        }
    }

    fn service(&mut self) {
        match self.link.service_interrupt() {
            Ok(InterruptOutcome::Received(payload)) => self.forward(payload),
            Ok(InterruptOutcome::TxAcknowledged { command, echo }) => {
                tracing::debug!(?command, "transmission acknowledged");
                self.forward(echo);
            },
            Ok(InterruptOutcome::RetryExhausted(command)) => {
                tracing::warn!(?command, "retries exhausted, command dropped");
            },
            Ok(InterruptOutcome::Orphaned(bit)) => {
                tracing::warn!(?bit, "completion interrupt with nothing in flight");
            },
            Ok(InterruptOutcome::Spurious) => {
                tracing::warn!("radio interrupt with no status bit set");
            },
            Err(err) => tracing::error!(%err, "failed to service radio interrupt"),
        }

        // Arm before the re-check: an edge after this point either posts
        // on its own or is seen as pending below.
        self.interrupt.arm();
        match self.link.pending() {
            Ok(true) => {
                if self.repost.try_send(RadioRequest::Interrupt).is_err() {
                    tracing::warn!("radio queue full, latched interrupt not re-posted");
                }
            },
            Ok(false) => {},
            Err(err) => tracing::warn!(%err, "failed to read radio status"),
        }

        while self.link.state() == LinkState::Idle {
            let Some(command) = self.backlog.pop_front() else { break };
            self.transmit(command);
        }
    }

    fn forward(&self, payload: Payload) {
        if self.messages.try_send(payload).is_err() {
            tracing::warn!("message queue full, payload dropped");
        }
    }
}
