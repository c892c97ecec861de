//! Fixed-width key and device records.
//!
//! ```text
//!   key line:     <id: key_length chars>,<level: 1 digit>     e.g. 00A1B2C3D4E5F607,3
//!   device line:  <id: 2 digits>,<level: 1 digit>             e.g. 07,2
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AccessConfig;

/// Highest access level (single decimal digit).
pub const MAX_LEVEL: u8 = 9;

/// Highest device identifier (two decimal digits).
pub const MAX_DEVICE_ID: u8 = 99;

/// A credential and the level it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Credential identifier, exactly `key_length` characters
    pub id: String,
    /// Access level 0-9
    pub level: u8,
}

/// A device and the level required to operate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Device identifier 1-99
    pub id: u8,
    /// Access level 0-9
    pub level: u8,
}

/// One row of an access table.
pub(crate) trait Record: Clone {
    type Id: PartialEq + fmt::Display + ?Sized;

    /// Singular noun used in errors and logs.
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;

    fn set_level(&mut self, level: u8);

    fn encode(&self) -> String;

    fn decode(line: &str, config: &AccessConfig) -> Result<Self, String>;
}

impl Record for KeyEntry {
    type Id = str;

    const KIND: &'static str = "key";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_level(&mut self, level: u8) {
        self.level = level;
    }

    fn encode(&self) -> String {
        format!("{},{:01}", self.id, self.level)
    }

    fn decode(line: &str, config: &AccessConfig) -> Result<Self, String> {
        let (id, level) = split_fixed(line, config.key_length)?;
        validate_key(id, config.key_length)?;
        Ok(Self { id: id.to_string(), level: parse_level(level)? })
    }
}

impl Record for DeviceEntry {
    type Id = u8;

    const KIND: &'static str = "device";

    fn id(&self) -> &u8 {
        &self.id
    }

    fn set_level(&mut self, level: u8) {
        self.level = level;
    }

    fn encode(&self) -> String {
        format!("{:02},{:01}", self.id, self.level)
    }

    fn decode(line: &str, _config: &AccessConfig) -> Result<Self, String> {
        let (id, level) = split_fixed(line, 2)?;
        let id = parse_digits(id).ok_or_else(|| format!("device id {id:?} is not two digits"))?;
        validate_device(id)?;
        Ok(Self { id, level: parse_level(level)? })
    }
}

/// Split `<id>,<level>` where the id is exactly `id_len` bytes and the level
/// one byte.
fn split_fixed(line: &str, id_len: usize) -> Result<(&str, &str), String> {
    if line.len() != id_len + 2 {
        return Err(format!("expected {} characters, found {}", id_len + 2, line.len()));
    }
    if line.as_bytes()[id_len] != b',' {
        return Err(format!("expected ',' at column {}", id_len + 1));
    }
    match (line.get(..id_len), line.get(id_len + 1..)) {
        (Some(id), Some(level)) => Ok((id, level)),
        _ => Err("not valid ASCII".to_string()),
    }
}

fn parse_digits(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_level(s: &str) -> Result<u8, String> {
    match s.as_bytes() {
        [b @ b'0'..=b'9'] => Ok(b - b'0'),
        _ => Err(format!("access level {s:?} is not one digit")),
    }
}

pub(crate) fn validate_key(id: &str, key_length: usize) -> Result<(), String> {
    if id.len() != key_length {
        return Err(format!("key must be {key_length} characters, got {}", id.len()));
    }
    if let Some(c) = id.chars().find(|c| !c.is_ascii_graphic() || *c == ',') {
        return Err(format!("key contains {c:?}"));
    }
    Ok(())
}

pub(crate) fn validate_device(id: u8) -> Result<(), String> {
    if !(1..=MAX_DEVICE_ID).contains(&id) {
        return Err(format!("device must be 1-{MAX_DEVICE_ID}, got {id}"));
    }
    Ok(())
}

pub(crate) fn validate_level(level: u8) -> Result<(), String> {
    if level > MAX_LEVEL {
        return Err(format!("access level must be 0-{MAX_LEVEL}, got {level}"));
    }
    Ok(())
}
