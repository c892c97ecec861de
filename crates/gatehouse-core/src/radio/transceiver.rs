use super::{RadioError, wire::Payload};

/// Interrupt causes latched in the transceiver status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    /// RX_DR: a payload is waiting in the receive FIFO.
    pub rx_ready: bool,
    /// TX_DS: the last transmission was acknowledged.
    pub tx_sent: bool,
    /// MAX_RT: the last transmission exhausted its retries.
    pub max_retries: bool,
}

impl Status {
    /// Whether any interrupt cause is latched.
    pub fn any(&self) -> bool {
        self.rx_ready || self.tx_sent || self.max_retries
    }
}

/// One status register bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBit {
    /// RX_DR
    RxReady,
    /// TX_DS
    TxSent,
    /// MAX_RT
    MaxRetries,
}

/// Register-level access to a packet radio.
///
/// The link only ever calls this from the radio task, so implementations
/// need no internal locking beyond what the hardware requires.
pub trait Transceiver: Send + 'static {
    /// Set channel and our own receive address, enable all interrupt causes
    /// and enter receive mode.
    fn configure(&mut self, channel: u8, rx_address: [u8; 5]) -> Result<(), RadioError>;

    /// Address the next transmission goes to.
    fn set_tx_address(&mut self, address: [u8; 5]) -> Result<(), RadioError>;

    /// Start transmitting one payload. Completion is signalled by interrupt.
    fn transmit(&mut self, payload: &Payload) -> Result<(), RadioError>;

    /// Read the status register.
    fn status(&mut self) -> Result<Status, RadioError>;

    /// Pop one payload from the receive FIFO.
    fn read_payload(&mut self) -> Result<Payload, RadioError>;

    /// Clear one latched status bit.
    fn clear(&mut self, bit: StatusBit) -> Result<(), RadioError>;

    /// Return to receive mode after a transmission.
    fn power_up_rx(&mut self) -> Result<(), RadioError>;
}
