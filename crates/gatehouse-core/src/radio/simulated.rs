use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{
    InterruptLine, RadioError,
    transceiver::{Status, StatusBit, Transceiver},
    wire::Payload,
};

/// How the simulated air completes a transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Latch TX_DS.
    Acknowledged,
    /// Latch MAX_RT.
    RetryExhausted,
}

/// In-process transceiver for tests and the loopback mode of the server.
///
/// Clones share state, so a test keeps one handle to drive the "air" while
/// the radio task owns another. Latching a status bit fires the attached
/// interrupt line, as the hardware IRQ pin would.
#[derive(Clone, Default)]
pub struct SimulatedTransceiver {
    state: Arc<Mutex<SimState>>,
}

#[derive(Default)]
struct SimState {
    status: Status,
    rx_fifo: VecDeque<Payload>,
    sent: Vec<([u8; 5], Payload)>,
    tx_address: [u8; 5],
    config: Option<(u8, [u8; 5])>,
    listening: bool,
    auto_complete: Option<TxOutcome>,
    fail_next_transmit: bool,
    interrupt: Option<InterruptLine>,
}

impl SimulatedTransceiver {
    /// A transceiver that never completes transmissions on its own.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect the IRQ pin.
    pub fn attach(&self, line: InterruptLine) {
        self.lock().interrupt = Some(line);
    }

    /// Complete every transmission immediately with `outcome`, or leave them
    /// pending with `None`.
    pub fn set_auto_complete(&self, outcome: Option<TxOutcome>) {
        self.lock().auto_complete = outcome;
    }

    /// Make the next `transmit` call fail.
    pub fn fail_next_transmit(&self) {
        self.lock().fail_next_transmit = true;
    }

    /// Deliver a payload from a device.
    pub fn inject_rx(&self, payload: Payload) {
        let line = {
            let mut state = self.lock();
            state.rx_fifo.push_back(payload);
            state.status.rx_ready = true;
            state.interrupt.clone()
        };
        fire(line);
    }

    /// Finish the pending transmission.
    pub fn complete_tx(&self, outcome: TxOutcome) {
        let line = {
            let mut state = self.lock();
            latch(&mut state.status, outcome);
            state.interrupt.clone()
        };
        fire(line);
    }

    /// Everything transmitted so far with its destination address.
    pub fn sent(&self) -> Vec<([u8; 5], Payload)> {
        self.lock().sent.clone()
    }

    /// Current status register.
    pub fn peek_status(&self) -> Status {
        self.lock().status
    }

    /// Whether the radio is in receive mode.
    pub fn is_listening(&self) -> bool {
        self.lock().listening
    }

    /// Channel and receive address from the last `configure`.
    pub fn configuration(&self) -> Option<(u8, [u8; 5])> {
        self.lock().config
    }
}

fn latch(status: &mut Status, outcome: TxOutcome) {
    match outcome {
        TxOutcome::Acknowledged => status.tx_sent = true,
        TxOutcome::RetryExhausted => status.max_retries = true,
    }
}

fn fire(line: Option<InterruptLine>) {
    if let Some(line) = line {
        line.fire();
    }
}

impl Transceiver for SimulatedTransceiver {
    fn configure(&mut self, channel: u8, rx_address: [u8; 5]) -> Result<(), RadioError> {
        let mut state = self.lock();
        state.config = Some((channel, rx_address));
        state.listening = true;
        Ok(())
    }

    fn set_tx_address(&mut self, address: [u8; 5]) -> Result<(), RadioError> {
        self.lock().tx_address = address;
        Ok(())
    }

    fn transmit(&mut self, payload: &Payload) -> Result<(), RadioError> {
        let line = {
            let mut state = self.lock();
            if std::mem::take(&mut state.fail_next_transmit) {
                return Err(RadioError::Hardware("simulated transmit failure".to_string()));
            }
            let address = state.tx_address;
            state.sent.push((address, *payload));
            state.listening = false;
            match state.auto_complete {
                Some(outcome) => {
                    latch(&mut state.status, outcome);
                    state.interrupt.clone()
                },
                None => None,
            }
        };
        fire(line);
        Ok(())
    }

    fn status(&mut self) -> Result<Status, RadioError> {
        Ok(self.lock().status)
    }

    fn read_payload(&mut self) -> Result<Payload, RadioError> {
        let mut state = self.lock();
        let payload = state
            .rx_fifo
            .pop_front()
            .ok_or_else(|| RadioError::Hardware("receive FIFO empty".to_string()))?;
        if !state.rx_fifo.is_empty() {
            // Hardware keeps RX_DR latched while the FIFO holds data.
            state.status.rx_ready = true;
        }
        Ok(payload)
    }

    fn clear(&mut self, bit: StatusBit) -> Result<(), RadioError> {
        let mut state = self.lock();
        match bit {
            StatusBit::RxReady => state.status.rx_ready = !state.rx_fifo.is_empty(),
            StatusBit::TxSent => state.status.tx_sent = false,
            StatusBit::MaxRetries => state.status.max_retries = false,
        }
        Ok(())
    }

    fn power_up_rx(&mut self) -> Result<(), RadioError> {
        self.lock().listening = true;
        Ok(())
    }
}
