use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime};
use gatehouse_store::LineStore;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::{LogBook, LogConfig, LogError, TIMESTAMP_FORMAT};
use crate::env::Environment;

const APRIL_FOOLS_TAG: &str = "APRILFOOLS";
const APRIL_FOOLS_INFO: &str = "OH NO SEEMS LIKE ALIENS STOLE OUR LOGS";

/// Serialize one entry as `tag,YYYY-MM-DD HH:MM:SS,message`.
///
/// On April 1st every entry is replaced by a fixed joke entry.
pub fn compose_line(tag: &str, message: &str, now: NaiveDateTime) -> Result<String, LogError> {
    if tag.contains(',') {
        return Err(LogError::InvalidInput(format!("tag {tag:?} contains ','")));
    }
    if tag.contains(['\n', '\r']) || message.contains(['\n', '\r']) {
        return Err(LogError::InvalidInput("entry contains a line break".to_string()));
    }

    let (tag, message) = if now.month() == 4 && now.day() == 1 {
        (APRIL_FOOLS_TAG, APRIL_FOOLS_INFO)
    } else {
        (tag, message)
    };
    Ok(format!("{tag},{},{message}", now.format(TIMESTAMP_FORMAT)))
}

/// Producer handle for the log queue.
///
/// Cheap to clone; usable from async tasks and plain threads alike since
/// submission never blocks.
#[derive(Clone)]
pub struct LogSubmitter<E: Environment> {
    tx: mpsc::Sender<String>,
    env: E,
    item_len: usize,
}

impl<E: Environment> LogSubmitter<E> {
    /// Timestamp and enqueue an entry.
    ///
    /// # Errors
    ///
    /// - `TooLong` if the composed line exceeds the item size
    /// - `QueueFull` if the queue is full
    /// - `Closed` if the consumer is gone
    pub fn submit(&self, tag: &str, message: &str) -> Result<(), LogError> {
        let line = compose_line(tag, message, self.env.local_now())?;
        if line.len() > self.item_len {
            return Err(LogError::TooLong { len: line.len(), max: self.item_len });
        }
        self.tx.try_send(line).map_err(|err| match err {
            TrySendError::Full(_) => LogError::QueueFull,
            TrySendError::Closed(_) => LogError::Closed,
        })
    }

    /// Submit and report failures through tracing instead of to the caller.
    pub fn submit_or_warn(&self, tag: &str, message: &str) {
        if let Err(err) = self.submit(tag, message) {
            tracing::warn!(tag, %err, "dropped log entry");
        }
    }
}

/// Single consumer of the log queue; the only writer of the log table.
pub struct LogConsumer<S: LineStore> {
    rx: mpsc::Receiver<String>,
    book: Arc<LogBook<S>>,
}

impl<S: LineStore> LogConsumer<S> {
    /// Create the queue feeding `book`.
    pub fn channel<E: Environment>(
        book: Arc<LogBook<S>>,
        env: E,
        config: &LogConfig,
    ) -> (LogSubmitter<E>, Self) {
        let (tx, rx) = mpsc::channel(config.queue_len.max(1));
        (LogSubmitter { tx, env, item_len: config.item_len }, Self { rx, book })
    }

    /// Record queued entries until every submitter has been dropped.
    ///
    /// A failed write is logged and the entry dropped; the loop continues.
    pub async fn run(mut self) {
        while let Some(line) = self.rx.recv().await {
            self.record(&line);
        }
        tracing::debug!("log queue closed, consumer exiting");
    }

    /// Record everything currently queued without waiting. Returns how many
    /// entries were taken off the queue.
    pub fn drain(&mut self) -> usize {
        let mut taken = 0;
        while let Ok(line) = self.rx.try_recv() {
            self.record(&line);
            taken += 1;
        }
        taken
    }

    fn record(&self, line: &str) {
        if let Err(err) = self.book.record(line) {
            tracing::error!(%err, "failed to write log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use gatehouse_store::MemoryStore;

    use super::*;
    use crate::{ErrorKind, env::ManualEnv};

    fn at(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .and_then(|d| d.and_hms_opt(9, 5, 7))
            .expect("valid")
    }

    #[test]
    fn line_layout() {
        assert_eq!(
            compose_line("NRF", "hello, world", at(5, 2)).expect("compose"),
            "NRF,2024-05-02 09:05:07,hello, world"
        );
    }

    #[test]
    fn april_first_replaces_entry() {
        assert_eq!(
            compose_line("NRF", "hello", at(4, 1)).expect("compose"),
            "APRILFOOLS,2024-04-01 09:05:07,OH NO SEEMS LIKE ALIENS STOLE OUR LOGS"
        );
        assert_eq!(
            compose_line("NRF", "hello", at(4, 2)).expect("compose"),
            "NRF,2024-04-02 09:05:07,hello"
        );
    }

    #[test]
    fn bad_fields_rejected() {
        assert!(matches!(compose_line("A,B", "m", at(5, 2)), Err(LogError::InvalidInput(_))));
        assert!(matches!(compose_line("A", "m\nx", at(5, 2)), Err(LogError::InvalidInput(_))));
    }

    fn pipeline(
        queue_len: usize,
    ) -> (LogSubmitter<ManualEnv>, LogConsumer<MemoryStore>, Arc<LogBook<MemoryStore>>) {
        let config = LogConfig { queue_len, ..LogConfig::default() };
        let book = Arc::new(LogBook::open(MemoryStore::new(), &config).expect("open"));
        let (submitter, consumer) =
            LogConsumer::channel(Arc::clone(&book), ManualEnv::new(at(5, 2)), &config);
        (submitter, consumer, book)
    }

    #[test]
    fn too_long_is_rejected_before_queueing() {
        let (submitter, mut consumer, book) = pipeline(4);

        let err = submitter.submit("T", &"x".repeat(200)).expect_err("too long");
        assert_eq!(err.kind(), ErrorKind::TooLong);

        assert_eq!(consumer.drain(), 0);
        assert_eq!(book.count(), 0);
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let (submitter, mut consumer, book) = pipeline(2);
        submitter.submit("T", "1").expect("submit");
        submitter.submit("T", "2").expect("submit");

        assert_eq!(submitter.submit("T", "3"), Err(LogError::QueueFull));

        assert_eq!(consumer.drain(), 2);
        assert_eq!(book.get_line(2).expect("line"), "T,2024-05-02 09:05:07,2");
    }

    #[tokio::test]
    async fn consumer_exits_when_submitters_drop() {
        let (submitter, consumer, book) = pipeline(20);
        submitter.submit("T", "first").expect("submit");
        submitter.submit("T", "second").expect("submit");
        drop(submitter);

        consumer.run().await;

        assert_eq!(book.count(), 2);
        assert_eq!(book.get_line(1).expect("line"), "T,2024-05-02 09:05:07,first");
    }
}
