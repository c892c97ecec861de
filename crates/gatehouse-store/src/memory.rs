use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    LineStore, StoreError,
    table::{validate_line, validate_range, validate_table},
};

/// In-memory line store for tests and simulation.
///
/// Same semantics as [`crate::FileStore`] minus durability: tables are `Vec`s
/// of lines, each kept with its terminator as a file would hold it, behind
/// one shared mutex. Every mutation is applied in one step, so it is
/// trivially atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `table` with raw file contents, e.g. a fixture whose final
    /// line has no terminator.
    pub fn load(&self, table: &str, contents: &str) -> Result<(), StoreError> {
        validate_table(table)?;
        let lines = contents.split_inclusive('\n').map(str::to_string).collect();
        self.lock().insert(table.to_string(), lines);
        Ok(())
    }

    /// Number of tables created so far.
    pub fn table_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Vec<String>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        validate_table(table)?;
        let mut tables = self.lock();
        let lines =
            tables.get_mut(table).ok_or_else(|| StoreError::MissingTable(table.to_string()))?;
        f(lines)
    }
}

impl LineStore for MemoryStore {
    fn ensure_exists(&self, table: &str) -> Result<(), StoreError> {
        validate_table(table)?;
        self.lock().entry(table.to_string()).or_default();
        Ok(())
    }

    fn append(&self, table: &str, line: &str) -> Result<(), StoreError> {
        validate_table(table)?;
        validate_line(line)?;
        let mut tables = self.lock();
        let lines = tables.entry(table.to_string()).or_default();
        if let Some(last) = lines.last_mut()
            && !last.ends_with('\n')
        {
            last.push('\n');
        }
        lines.push(terminated(line));
        Ok(())
    }

    fn read(&self, table: &str, n: usize) -> Result<String, StoreError> {
        self.with_table(table, |lines| {
            n.checked_sub(1)
                .and_then(|i| lines.get(i))
                .cloned()
                .ok_or_else(|| StoreError::NotFound { table: table.to_string(), line: n })
        })
    }

    fn read_all(&self, table: &str) -> Result<Vec<String>, StoreError> {
        self.with_table(table, |lines| {
            let stripped = lines.iter().map(|line| line.strip_suffix('\n').unwrap_or(line));
            Ok(stripped.map(str::to_string).collect())
        })
    }

    fn overwrite(&self, table: &str, n: usize, line: &str) -> Result<(), StoreError> {
        validate_line(line)?;
        self.with_table(table, |lines| {
            let slot = n
                .checked_sub(1)
                .and_then(|i| lines.get_mut(i))
                .ok_or_else(|| StoreError::NotFound { table: table.to_string(), line: n })?;
            *slot = terminated(line);
            Ok(())
        })
    }

    fn delete_range(&self, table: &str, start: usize, end: usize) -> Result<usize, StoreError> {
        validate_range(start, end)?;
        self.with_table(table, |lines| {
            if start > lines.len() {
                return Ok(0);
            }
            let end = end.min(lines.len());
            lines.drain(start - 1..end);
            Ok(end - start + 1)
        })
    }

    fn truncate(&self, table: &str) -> Result<(), StoreError> {
        self.with_table(table, |lines| {
            lines.clear();
            Ok(())
        })
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        self.with_table(table, |lines| Ok(lines.len()))
    }
}

fn terminated(line: &str) -> String {
    let mut record = String::with_capacity(line.len() + 1);
    record.push_str(line);
    record.push('\n');
    record
}
