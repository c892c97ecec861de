use std::sync::{Mutex, MutexGuard, PoisonError};

use gatehouse_store::LineStore;

use super::{LOG_TABLE, LogConfig, LogError, LogRecord};

/// Log table plus its in-memory line count.
///
/// The mutex guards the count and serializes every access to the table, so
/// the count always equals the table's line count between operations.
pub struct LogBook<S: LineStore> {
    store: S,
    ceiling: usize,
    count: Mutex<usize>,
}

/// A contiguous run of log lines read for upload.
///
/// Keeps the raw lines so the range can be deleted later only if it still
/// holds exactly these lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    start: usize,
    lines: Vec<String>,
}

impl LogBatch {
    /// First line of the batch (1-based).
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last line of the batch.
    pub fn end(&self) -> usize {
        self.start + self.lines.len().saturating_sub(1)
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the batch holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The lines parsed into records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lines.iter().map(|line| LogRecord::parse(line)).collect()
    }
}

impl<S: LineStore> LogBook<S> {
    /// Open the log table, creating it if absent.
    ///
    /// A table found above the ceiling (e.g. after lowering it) is trimmed
    /// from the front.
    pub fn open(store: S, config: &LogConfig) -> Result<Self, LogError> {
        store.ensure_exists(LOG_TABLE)?;
        let mut count = store.count(LOG_TABLE)?;
        if count > config.ceiling {
            let excess = count - config.ceiling;
            let removed = store.delete_range(LOG_TABLE, 1, excess)?;
            tracing::warn!(removed, ceiling = config.ceiling, "log table above ceiling, trimmed");
            count -= removed;
        }
        tracing::debug!(count, "log table opened");
        Ok(Self { store, ceiling: config.ceiling, count: Mutex::new(count) })
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // The count is only changed after the store confirmed the change.
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maximum number of lines kept.
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Append one serialized entry, evicting the oldest lines first while
    /// the log is at its ceiling.
    pub fn record(&self, line: &str) -> Result<(), LogError> {
        let mut count = self.lock();
        while *count >= self.ceiling && *count > 0 {
            self.store.delete_first(LOG_TABLE)?;
            *count -= 1;
            tracing::trace!("evicted oldest log line");
        }
        self.store.append(LOG_TABLE, line)?;
        *count += 1;
        Ok(())
    }

    /// Line `n` without its terminator.
    pub fn get_line(&self, n: usize) -> Result<String, LogError> {
        let _count = self.lock();
        self.read_line(n)
    }

    /// Caller holds the lock.
    fn read_line(&self, n: usize) -> Result<String, LogError> {
        let mut line = self.store.read(LOG_TABLE, n)?;
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(line)
    }

    /// Lines `start..=end` one at a time, so only the range is held in
    /// memory. Caller holds the lock.
    fn read_lines(&self, start: usize, end: usize) -> Result<Vec<String>, LogError> {
        (start..=end).map(|n| self.read_line(n)).collect()
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Delete lines `start..=end`.
    ///
    /// # Errors
    ///
    /// `InvalidRange` unless `1 <= start <= end <= count`.
    pub fn delete_range(&self, start: usize, end: usize) -> Result<usize, LogError> {
        let mut count = self.lock();
        if start == 0 || start > end || end > *count {
            return Err(LogError::InvalidRange { start, end, count: *count });
        }
        let removed = self.store.delete_range(LOG_TABLE, start, end)?;
        *count -= removed;
        Ok(removed)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<(), LogError> {
        let mut count = self.lock();
        self.store.truncate(LOG_TABLE)?;
        *count = 0;
        Ok(())
    }

    /// Every entry in order, parsed.
    pub fn records(&self) -> Result<Vec<LogRecord>, LogError> {
        let _count = self.lock();
        let lines = self.store.read_all(LOG_TABLE)?;
        Ok(lines.iter().map(|line| LogRecord::parse(line)).collect())
    }

    /// Read lines `start..=end` for upload.
    pub fn read_batch(&self, start: usize, end: usize) -> Result<LogBatch, LogError> {
        let count = self.lock();
        if start == 0 || start > end || end > *count {
            return Err(LogError::InvalidRange { start, end, count: *count });
        }
        let lines = self.read_lines(start, end)?;
        Ok(LogBatch { start, lines })
    }

    /// Delete an uploaded batch if its lines are still where they were read.
    ///
    /// Returns the number of lines deleted: the batch length, or zero when
    /// eviction or another deletion has moved the lines since they were read.
    pub fn delete_batch(&self, batch: &LogBatch) -> Result<usize, LogError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let mut count = self.lock();
        if batch.end() > *count {
            return Ok(0);
        }
        if self.read_lines(batch.start, batch.end())? != batch.lines {
            tracing::warn!(start = batch.start, len = batch.len(), "log lines moved during sync");
            return Ok(0);
        }
        let removed = self.store.delete_range(LOG_TABLE, batch.start, batch.end())?;
        *count -= removed;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_store::{ChaoticStore, MemoryStore, StoreError};

    use super::*;

    fn book(ceiling: usize) -> (MemoryStore, LogBook<MemoryStore>) {
        let store = MemoryStore::new();
        let config = LogConfig { ceiling, ..LogConfig::default() };
        let book = LogBook::open(store.clone(), &config).expect("open");
        (store, book)
    }

    #[test]
    fn record_evicts_oldest_at_ceiling() {
        let (store, book) = book(3);
        for i in 1..=5 {
            book.record(&format!("T{i},2024-01-01 00:00:00,m")).expect("record");
        }
        assert_eq!(book.count(), 3);
        assert_eq!(store.count(LOG_TABLE).expect("count"), 3);
        assert_eq!(book.get_line(1).expect("line"), "T3,2024-01-01 00:00:00,m");
    }

    #[test]
    fn delete_range_validates_against_count() {
        let (_, book) = book(10);
        for i in 1..=4 {
            book.record(&format!("T{i},d,m")).expect("record");
        }
        assert!(matches!(book.delete_range(0, 1), Err(LogError::InvalidRange { .. })));
        assert!(matches!(book.delete_range(3, 2), Err(LogError::InvalidRange { .. })));
        assert!(matches!(book.delete_range(2, 5), Err(LogError::InvalidRange { count: 4, .. })));

        assert_eq!(book.delete_range(2, 3).expect("delete"), 2);
        assert_eq!(book.count(), 2);
        assert_eq!(book.get_line(2).expect("line"), "T4,d,m");
    }

    #[test]
    fn open_trims_oversized_table() {
        let store = MemoryStore::new();
        for i in 1..=6 {
            store.append(LOG_TABLE, &format!("T{i},d,m")).expect("append");
        }
        let book =
            LogBook::open(store, &LogConfig { ceiling: 4, ..LogConfig::default() }).expect("open");
        assert_eq!(book.count(), 4);
        assert_eq!(book.get_line(1).expect("line"), "T3,d,m");
    }

    #[test]
    fn failed_append_keeps_count() {
        let store = ChaoticStore::new(MemoryStore::new(), 0.0);
        let book = LogBook::open(store.clone(), &LogConfig::default()).expect("open");
        book.record("T1,d,m").expect("record");

        store.set_failure_rate(1.0);
        assert!(book.record("T2,d,m").is_err());
        assert!(book.clear().is_err());

        assert_eq!(book.count(), 1);
        assert_eq!(store.inner().count(LOG_TABLE).expect("count"), 1);
    }

    #[test]
    fn moved_batch_is_not_deleted() {
        let (_, book) = book(3);
        for i in 1..=3 {
            book.record(&format!("T{i},d,m")).expect("record");
        }
        let batch = book.read_batch(1, 2).expect("batch");

        // Eviction shifts every line up by one.
        book.record("T4,d,m").expect("record");

        assert_eq!(book.delete_batch(&batch).expect("delete"), 0);
        assert_eq!(book.count(), 3);
    }

    /// Refuses whole-table reads.
    #[derive(Clone)]
    struct RangeOnly(MemoryStore);

    impl LineStore for RangeOnly {
        fn ensure_exists(&self, table: &str) -> Result<(), StoreError> {
            self.0.ensure_exists(table)
        }

        fn append(&self, table: &str, line: &str) -> Result<(), StoreError> {
            self.0.append(table, line)
        }

        fn read(&self, table: &str, n: usize) -> Result<String, StoreError> {
            self.0.read(table, n)
        }

        fn read_all(&self, _table: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Io("whole-table read".to_string()))
        }

        fn overwrite(&self, table: &str, n: usize, line: &str) -> Result<(), StoreError> {
            self.0.overwrite(table, n, line)
        }

        fn delete_range(&self, table: &str, start: usize, end: usize) -> Result<usize, StoreError> {
            self.0.delete_range(table, start, end)
        }

        fn truncate(&self, table: &str) -> Result<(), StoreError> {
            self.0.truncate(table)
        }

        fn count(&self, table: &str) -> Result<usize, StoreError> {
            self.0.count(table)
        }
    }

    #[test]
    fn batches_read_only_their_range() {
        let book =
            LogBook::open(RangeOnly(MemoryStore::new()), &LogConfig::default()).expect("open");
        for i in 1..=5 {
            book.record(&format!("T{i},d,m")).expect("record");
        }

        let batch = book.read_batch(2, 3).expect("batch");
        assert_eq!(batch.records()[0].tag, "T2");
        assert_eq!(batch.end(), 3);

        assert_eq!(book.delete_batch(&batch).expect("delete"), 2);
        assert_eq!(book.count(), 3);
        assert_eq!(book.get_line(2).expect("line"), "T4,d,m");
    }

    #[test]
    fn clear_resets_count() {
        let (store, book) = book(5);
        book.record("T1,d,m").expect("record");
        book.clear().expect("clear");
        assert_eq!(book.count(), 0);
        assert_eq!(store.count(LOG_TABLE).expect("count"), 0);
    }
}
