use thiserror::Error;

/// Errors from line-store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The table has fewer lines than the requested position.
    #[error("table {table:?} has no line {line}")]
    NotFound {
        /// Table name
        table: String,
        /// Requested 1-based line
        line: usize,
    },

    /// The table has never been created.
    #[error("table {0:?} does not exist")]
    MissingTable(String),

    /// `start == 0` or `start > end`.
    #[error("invalid line range {start}..={end}")]
    InvalidRange {
        /// First line of the range
        start: usize,
        /// Last line of the range
        end: usize,
    },

    /// Bad table name or a line containing a line break.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The medium failed. Prior table content is intact.
    #[error("storage I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// The addressed line or table does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::MissingTable(_))
    }

    /// Retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
