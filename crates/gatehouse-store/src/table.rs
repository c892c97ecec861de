//! Input validation shared by every store implementation.

use crate::StoreError;

/// Check that `table` is a plain file name.
///
/// Rejects empty names, path separators, `.`/`..` and leading dots (reserved
/// for temporary files).
pub fn validate_table(table: &str) -> Result<(), StoreError> {
    if table.is_empty() {
        return Err(StoreError::InvalidInput("empty table name".to_string()));
    }
    if table.starts_with('.') {
        return Err(StoreError::InvalidInput(format!("table name {table:?} starts with '.'")));
    }
    if table.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(StoreError::InvalidInput(format!("table name {table:?} is not a file name")));
    }
    Ok(())
}

/// Check that `line` can be stored as one record.
pub fn validate_line(line: &str) -> Result<(), StoreError> {
    if line.contains(['\n', '\r']) {
        return Err(StoreError::InvalidInput("line contains a line break".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_range(start: usize, end: usize) -> Result<(), StoreError> {
    if start == 0 || start > end {
        return Err(StoreError::InvalidRange { start, end });
    }
    Ok(())
}
