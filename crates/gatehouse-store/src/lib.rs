//! Line-addressed record tables.
//!
//! A table is an ordered sequence of text lines kept in one named file. The
//! 1-based line position is the only addressing scheme. Every component that
//! persists state (keys, devices, logs) goes through the [`LineStore`] trait.
//!
//! # Atomicity
//!
//! Mutations that edit existing lines (`overwrite`, `delete`, `delete_range`,
//! `delete_first`) never modify a table in place. The complete replacement is
//! streamed into a temporary file in the same directory, flushed, synced and
//! renamed over the original:
//!
//! ```text
//!   keys.txt ──read──> .keys.txt.XXXX.tmp ──fsync──> rename ──> keys.txt
//!                              │
//!                   failure ───┴──> temp removed, keys.txt untouched
//! ```
//!
//! `append` and `truncate` act in place. Callers serialize access to a table
//! with their own lock; the store itself does not.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chaotic;
mod error;
mod file;
mod memory;
mod table;

pub use chaotic::ChaoticStore;
pub use error::StoreError;
pub use file::{CrashPoint, FileStore};
pub use memory::MemoryStore;
pub use table::{validate_line, validate_table};

/// Storage abstraction for line tables.
///
/// Must be Clone (components share one store), Send + Sync, and synchronous.
/// Implementations share state behind an `Arc`, so clones see the same
/// tables.
pub trait LineStore: Clone + Send + Sync + 'static {
    /// Create the table if it does not exist. Idempotent.
    fn ensure_exists(&self, table: &str) -> Result<(), StoreError>;

    /// Append `line` at the end of the table, creating the table if needed.
    ///
    /// `line` must not contain line breaks; the terminator is added here.
    fn append(&self, table: &str, line: &str) -> Result<(), StoreError>;

    /// Line `n` including its terminator.
    ///
    /// A final line written without terminator is returned as stored.
    fn read(&self, table: &str, n: usize) -> Result<String, StoreError>;

    /// Every line of the table, terminators stripped.
    fn read_all(&self, table: &str) -> Result<Vec<String>, StoreError>;

    /// Replace line `n` with `line`, all other lines copied unchanged.
    fn overwrite(&self, table: &str, n: usize, line: &str) -> Result<(), StoreError>;

    /// Remove the inclusive range `start..=end` and return how many lines
    /// were actually removed.
    ///
    /// # Errors
    ///
    /// `InvalidRange` when `start == 0` or `start > end`. A range reaching
    /// past the end of the table removes what exists.
    fn delete_range(&self, table: &str, start: usize, end: usize) -> Result<usize, StoreError>;

    /// Empty the table without removing it.
    fn truncate(&self, table: &str) -> Result<(), StoreError>;

    /// Number of lines. A final line without terminator counts.
    fn count(&self, table: &str) -> Result<usize, StoreError>;

    /// Remove line `n`, shifting later lines up by one.
    fn delete(&self, table: &str, n: usize) -> Result<(), StoreError> {
        if n == 0 {
            return Err(StoreError::InvalidRange { start: n, end: n });
        }
        match self.delete_range(table, n, n)? {
            0 => Err(StoreError::NotFound { table: table.to_string(), line: n }),
            _ => Ok(()),
        }
    }

    /// Remove line 1 (FIFO eviction).
    fn delete_first(&self, table: &str) -> Result<(), StoreError> {
        self.delete(table, 1)
    }
}
