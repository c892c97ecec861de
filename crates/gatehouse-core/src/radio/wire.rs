//! Radio message encoding.
//!
//! # Queue frame (17 bytes)
//!
//! ```text
//!   0        1         2..4      4        5..17
//!   origin   subtype   device    flag     zero
//!   '0'      '0' toggle  'NN'    '1' on / '0' off
//!            '1' ping            '1'
//! ```
//!
//! Origin `'0'` is a locally-originated command, `'1'` an interrupt
//! notification. Bytes `1..17` are the 16-byte radio payload.
//!
//! # Inbound payload (16 bytes)
//!
//! ```text
//!   0        1..3      3..11                       15
//!   type     device    ACCESS: 8 credential bytes  'X' when this is the echo
//!   '0' ACCESS 'NN'    PING:   byte 3 = status     of a command we sent
//!   '1' PING
//! ```

use thiserror::Error;

use crate::{ErrorKind, access::MAX_DEVICE_ID};

/// Radio payload size.
pub const PAYLOAD_LEN: usize = 16;

/// Queue frame size: origin byte plus payload.
pub const FRAME_LEN: usize = PAYLOAD_LEN + 1;

/// Marker at [`MARKER_POS`] on the echo of a delivered command.
pub const ACK_MARKER: u8 = b'X';

/// Position of [`ACK_MARKER`] in a payload.
pub const MARKER_POS: usize = PAYLOAD_LEN - 1;

const ORIGIN_LOCAL: u8 = b'0';
const ORIGIN_INTERRUPT: u8 = b'1';
const SUBTYPE_TOGGLE: u8 = b'0';
const SUBTYPE_PING: u8 = b'1';

/// A 16-byte radio payload.
pub type Payload = [u8; PAYLOAD_LEN];

/// Errors decoding or encoding radio messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Device outside 1-99 or not two digits.
    #[error("invalid device {0:?}")]
    InvalidDevice(String),

    /// Subtype or type byte not defined.
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),

    /// Request has no queue frame form.
    #[error("request has no frame form")]
    NoFrame,
}

impl WireError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Command sent to a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCommand {
    /// Switch the device on or off.
    Toggle {
        /// Device 1-99
        device: u8,
        /// Target state
        on: bool,
    },
    /// Health check.
    Ping {
        /// Device 1-99
        device: u8,
    },
}

impl RadioCommand {
    /// Destination device.
    pub fn device(&self) -> u8 {
        match *self {
            Self::Toggle { device, .. } | Self::Ping { device } => device,
        }
    }

    /// The 16-byte payload put on the air.
    pub fn payload(&self) -> Result<Payload, WireError> {
        let [d0, d1] = device_digits(self.device())?;
        let mut payload = [0u8; PAYLOAD_LEN];
        let (subtype, flag) = match *self {
            Self::Toggle { on, .. } => (SUBTYPE_TOGGLE, if on { b'1' } else { b'0' }),
            Self::Ping { .. } => (SUBTYPE_PING, b'1'),
        };
        payload[..4].copy_from_slice(&[subtype, d0, d1, flag]);
        Ok(payload)
    }
}

/// Request on the radio queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioRequest {
    /// Send a command.
    Transmit(RadioCommand),
    /// The transceiver raised its interrupt line.
    Interrupt,
    /// Stop the radio task.
    Shutdown,
}

impl RadioRequest {
    /// Encode as a 17-byte queue frame.
    ///
    /// # Errors
    ///
    /// `InvalidDevice` for a command to a device outside 1-99. `Shutdown` has
    /// no frame form (`NoFrame`).
    pub fn encode(&self) -> Result<[u8; FRAME_LEN], WireError> {
        let mut frame = [0u8; FRAME_LEN];
        match self {
            Self::Transmit(command) => {
                frame[0] = ORIGIN_LOCAL;
                frame[1..].copy_from_slice(&command.payload()?);
            },
            Self::Interrupt => frame[0] = ORIGIN_INTERRUPT,
            Self::Shutdown => return Err(WireError::NoFrame),
        }
        Ok(frame)
    }
}

/// Transmit address of a device: `"000"` followed by its two digits.
pub fn tx_address(device: u8) -> Result<[u8; 5], WireError> {
    let [d0, d1] = device_digits(device)?;
    Ok([b'0', b'0', b'0', d0, d1])
}

/// Message received from a device, or the echo of one we sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// A credential was presented at a device.
    AccessRequest {
        /// Reporting device
        device: u8,
        /// Raw credential bytes
        credential: [u8; 8],
    },
    /// A toggle command we sent was delivered.
    ToggleDelivered {
        /// Destination device
        device: u8,
        /// State that was requested
        on: bool,
    },
    /// Health report; status `1` means healthy.
    Ping {
        /// Reporting device
        device: u8,
        /// Status code
        status: u8,
    },
    /// A ping we sent was delivered.
    PingDelivered {
        /// Destination device
        device: u8,
    },
}

impl Report {
    /// Decode an inbound payload.
    pub fn decode(payload: &Payload) -> Result<Self, WireError> {
        let device = parse_device(payload[1], payload[2])?;
        let echo = payload[MARKER_POS] == ACK_MARKER;
        match (payload[0], echo) {
            (b'0', false) => {
                let mut credential = [0u8; 8];
                credential.copy_from_slice(&payload[3..11]);
                Ok(Self::AccessRequest { device, credential })
            },
            (b'0', true) => Ok(Self::ToggleDelivered { device, on: payload[3] == b'1' }),
            (b'1', false) => Ok(Self::Ping { device, status: payload[3].wrapping_sub(b'0') }),
            (b'1', true) => Ok(Self::PingDelivered { device }),
            (other, _) => Err(WireError::UnknownType(other)),
        }
    }

    /// Device the report concerns.
    pub fn device(&self) -> u8 {
        match *self {
            Self::AccessRequest { device, .. }
            | Self::ToggleDelivered { device, .. }
            | Self::Ping { device, .. }
            | Self::PingDelivered { device } => device,
        }
    }
}

/// Render credential bytes as the 16-character key identifier.
pub fn credential_id(credential: &[u8; 8]) -> String {
    hex::encode_upper(credential)
}

fn device_digits(device: u8) -> Result<[u8; 2], WireError> {
    if !(1..=MAX_DEVICE_ID).contains(&device) {
        return Err(WireError::InvalidDevice(device.to_string()));
    }
    Ok([b'0' + device / 10, b'0' + device % 10])
}

fn parse_device(tens: u8, ones: u8) -> Result<u8, WireError> {
    if !tens.is_ascii_digit() || !ones.is_ascii_digit() {
        return Err(WireError::InvalidDevice(String::from_utf8_lossy(&[tens, ones]).into_owned()));
    }
    let device = (tens - b'0') * 10 + (ones - b'0');
    if device == 0 {
        return Err(WireError::InvalidDevice("00".to_string()));
    }
    Ok(device)
}
