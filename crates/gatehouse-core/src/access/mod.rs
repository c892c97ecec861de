//! Key and device access tables.
//!
//! Each table is a line table in the store mirrored 1:1 by a bounded in-memory
//! array: entry `i` of the array is line `i + 1` of the table. Every mutation
//! writes the store first and updates memory only once the store accepted
//! it, so a failed write never leaves the two out of step.
//!
//! # Authorization
//!
//! A key may operate a device iff `key.level >= device.level`.

mod error;
mod record;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use error::AccessError;
use gatehouse_store::LineStore;
pub use record::{DeviceEntry, KeyEntry, MAX_DEVICE_ID, MAX_LEVEL};
use record::{Record, validate_device, validate_key, validate_level};
use serde::{Deserialize, Serialize};

/// Table holding one `id,level` line per key.
pub const KEY_TABLE: &str = "keys.txt";

/// Table holding one `id,level` line per device.
pub const DEVICE_TABLE: &str = "devices.txt";

/// Sizing of the access tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Exact length of a key identifier.
    pub key_length: usize,
    /// Maximum number of keys.
    pub max_keys: usize,
    /// Maximum number of devices.
    pub max_devices: usize,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self { key_length: 16, max_keys: 40, max_devices: 40 }
    }
}

/// Bounded mirror of one table.
struct Table<R> {
    name: &'static str,
    capacity: usize,
    entries: Vec<R>,
}

impl<R: Record> Table<R> {
    fn load<S: LineStore>(
        store: &S,
        name: &'static str,
        capacity: usize,
        config: &AccessConfig,
    ) -> Result<Self, AccessError> {
        store.ensure_exists(name)?;
        let lines = store.read_all(name)?;
        if lines.len() > capacity {
            return Err(AccessError::MalformedRecord {
                table: name,
                line: capacity + 1,
                reason: format!("table holds {} entries, capacity is {capacity}", lines.len()),
            });
        }

        let mut entries: Vec<R> = Vec::with_capacity(capacity);
        for (i, line) in lines.iter().enumerate() {
            let entry = R::decode(line, config).map_err(|reason| AccessError::MalformedRecord {
                table: name,
                line: i + 1,
                reason,
            })?;
            if entries.iter().any(|e| e.id() == entry.id()) {
                return Err(AccessError::MalformedRecord {
                    table: name,
                    line: i + 1,
                    reason: format!("duplicate {} {}", R::KIND, entry.id()),
                });
            }
            entries.push(entry);
        }

        tracing::debug!(table = name, entries = entries.len(), "loaded access table");
        Ok(Self { name, capacity, entries })
    }

    fn position(&self, id: &R::Id) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    fn find(&self, id: &R::Id) -> Result<&R, AccessError> {
        self.entries.iter().find(|e| e.id() == id).ok_or_else(|| not_found::<R>(id))
    }

    fn add<S: LineStore>(&mut self, store: &S, entry: R) -> Result<(), AccessError> {
        if self.position(entry.id()).is_some() {
            return Err(AccessError::Duplicate { kind: R::KIND, id: entry.id().to_string() });
        }
        if self.entries.len() >= self.capacity {
            return Err(AccessError::Capacity { kind: R::KIND, capacity: self.capacity });
        }
        store.append(self.name, &entry.encode())?;
        self.entries.push(entry);
        Ok(())
    }

    fn remove<S: LineStore>(&mut self, store: &S, id: &R::Id) -> Result<(), AccessError> {
        let index = self.position(id).ok_or_else(|| not_found::<R>(id))?;
        store.delete(self.name, index + 1)?;
        self.entries.remove(index);
        Ok(())
    }

    fn change_level<S: LineStore>(
        &mut self,
        store: &S,
        id: &R::Id,
        level: u8,
    ) -> Result<(), AccessError> {
        let index = self.position(id).ok_or_else(|| not_found::<R>(id))?;
        let mut updated = self.entries[index].clone();
        updated.set_level(level);
        store.overwrite(self.name, index + 1, &updated.encode())?;
        self.entries[index] = updated;
        Ok(())
    }

    fn clear<S: LineStore>(&mut self, store: &S) -> Result<(), AccessError> {
        store.truncate(self.name)?;
        self.entries.clear();
        Ok(())
    }
}

fn not_found<R: Record>(id: &R::Id) -> AccessError {
    AccessError::NotFound { kind: R::KIND, id: id.to_string() }
}

struct Tables {
    keys: Table<KeyEntry>,
    devices: Table<DeviceEntry>,
}

/// Key and device authorizer.
///
/// One mutex guards both tables for the whole of every operation, so each
/// call is linearizable with respect to the others.
pub struct AccessControl<S: LineStore> {
    store: S,
    config: AccessConfig,
    tables: Mutex<Tables>,
}

impl<S: LineStore> AccessControl<S> {
    /// Load both tables from `store`, creating them if absent.
    ///
    /// # Errors
    ///
    /// `MalformedRecord` if any line fails to parse, an id repeats or a table
    /// exceeds its capacity. The authorizer is never built from a partially
    /// loaded table.
    pub fn open(store: S, config: AccessConfig) -> Result<Self, AccessError> {
        let keys = Table::load(&store, KEY_TABLE, config.max_keys, &config)?;
        let devices = Table::load(&store, DEVICE_TABLE, config.max_devices, &config)?;
        tracing::info!(
            keys = keys.entries.len(),
            devices = devices.entries.len(),
            "access tables loaded"
        );
        Ok(Self { store, config, tables: Mutex::new(Tables { keys, devices }) })
    }

    /// Table sizing in use.
    #[must_use]
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Memory is only mutated after the store accepted a change, so a
        // panicking holder cannot have left the tables half-updated.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `key` may operate `device`.
    ///
    /// # Errors
    ///
    /// `NotFound` if either the key or the device is unknown.
    pub fn authorize(&self, device: u8, key: &str) -> Result<bool, AccessError> {
        let tables = self.lock();
        let device = tables.devices.find(&device)?;
        let key = tables.keys.find(key)?;
        Ok(key.level >= device.level)
    }

    /// Add a key.
    pub fn add_key(&self, id: &str, level: u8) -> Result<(), AccessError> {
        validate_key(id, self.config.key_length).map_err(AccessError::invalid)?;
        validate_level(level).map_err(AccessError::invalid)?;
        self.lock().keys.add(&self.store, KeyEntry { id: id.to_string(), level })?;
        tracing::info!(key = id, level, "key added");
        Ok(())
    }

    /// Remove a key, compacting the table.
    pub fn delete_key(&self, id: &str) -> Result<(), AccessError> {
        self.lock().keys.remove(&self.store, id)?;
        tracing::info!(key = id, "key deleted");
        Ok(())
    }

    /// Change the level of an existing key.
    pub fn change_key_access_level(&self, id: &str, level: u8) -> Result<(), AccessError> {
        validate_level(level).map_err(AccessError::invalid)?;
        self.lock().keys.change_level(&self.store, id, level)?;
        tracing::info!(key = id, level, "key access level changed");
        Ok(())
    }

    /// Add a device.
    pub fn add_device(&self, id: u8, level: u8) -> Result<(), AccessError> {
        validate_device(id).map_err(AccessError::invalid)?;
        validate_level(level).map_err(AccessError::invalid)?;
        self.lock().devices.add(&self.store, DeviceEntry { id, level })?;
        tracing::info!(device = id, level, "device added");
        Ok(())
    }

    /// Remove a device, compacting the table.
    pub fn delete_device(&self, id: u8) -> Result<(), AccessError> {
        self.lock().devices.remove(&self.store, &id)?;
        tracing::info!(device = id, "device deleted");
        Ok(())
    }

    /// Change the level of an existing device.
    pub fn change_device_access_level(&self, id: u8, level: u8) -> Result<(), AccessError> {
        validate_level(level).map_err(AccessError::invalid)?;
        self.lock().devices.change_level(&self.store, &id, level)?;
        tracing::info!(device = id, level, "device access level changed");
        Ok(())
    }

    /// All keys in table order.
    pub fn list_keys(&self) -> Vec<KeyEntry> {
        self.lock().keys.entries.clone()
    }

    /// All devices in table order.
    pub fn list_devices(&self) -> Vec<DeviceEntry> {
        self.lock().devices.entries.clone()
    }

    /// Number of keys.
    pub fn key_count(&self) -> usize {
        self.lock().keys.entries.len()
    }

    /// Number of devices.
    pub fn device_count(&self) -> usize {
        self.lock().devices.entries.len()
    }

    /// Remove every key.
    pub fn clear_all_keys(&self) -> Result<(), AccessError> {
        self.lock().keys.clear(&self.store)?;
        tracing::info!("all keys cleared");
        Ok(())
    }

    /// Remove every device.
    pub fn clear_all_devices(&self) -> Result<(), AccessError> {
        self.lock().devices.clear(&self.store)?;
        tracing::info!("all devices cleared");
        Ok(())
    }
}
