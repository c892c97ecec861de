//! Queue-fed log with FIFO eviction.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use gatehouse_core::{
    env::ManualEnv,
    logbook::{LOG_TABLE, LogBook, LogConfig, LogConsumer, LogError},
};
use gatehouse_store::{FileStore, LineStore, MemoryStore};
use proptest::prelude::*;
use tempfile::tempdir;

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 15).and_then(|d| d.and_hms_opt(12, 0, 0)).expect("valid")
}

#[tokio::test]
async fn two_hundred_and_three_entries_keep_the_newest() {
    let config = LogConfig::default();
    let book = Arc::new(LogBook::open(MemoryStore::new(), &config).expect("open"));
    let (submitter, consumer) =
        LogConsumer::channel(Arc::clone(&book), ManualEnv::new(noon()), &config);
    let consumer = tokio::spawn(consumer.run());

    for i in 1..=203 {
        // Queue holds 20; yield to the consumer whenever it is full.
        loop {
            match submitter.submit(&format!("T{i}"), "m") {
                Ok(()) => break,
                Err(LogError::QueueFull) => tokio::task::yield_now().await,
                Err(err) => unreachable!("submit failed: {err}"),
            }
        }
    }
    drop(submitter);
    consumer.await.expect("consumer");

    assert_eq!(book.count(), 200);
    assert_eq!(book.get_line(1).expect("line 1"), "T4,2024-06-15 12:00:00,m");
    assert_eq!(book.get_line(200).expect("line 200"), "T203,2024-06-15 12:00:00,m");
}

#[test]
fn count_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let config = LogConfig { ceiling: 5, ..LogConfig::default() };
    {
        let store = FileStore::open(dir.path()).expect("store");
        let book = LogBook::open(store, &config).expect("open");
        for i in 1..=7 {
            book.record(&format!("T{i},2024-06-15 12:00:00,m")).expect("record");
        }
    }

    let store = FileStore::open(dir.path()).expect("store");
    let book = LogBook::open(store.clone(), &config).expect("reopen");
    assert_eq!(book.count(), 5);
    assert_eq!(store.count(LOG_TABLE).expect("count"), 5);
    assert_eq!(book.get_line(1).expect("line"), "T3,2024-06-15 12:00:00,m");
}

#[test]
fn records_parse_every_line() {
    let book = LogBook::open(MemoryStore::new(), &LogConfig::default()).expect("open");
    book.record("NRF,2024-06-15 12:00:00,received PING from device: 3, error code: 2")
        .expect("record");

    let records = book.records().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tag, "NRF");
    assert_eq!(records[0].info, "received PING from device: 3, error code: 2");
}

#[test]
fn get_line_past_end_is_not_found() {
    let book = LogBook::open(MemoryStore::new(), &LogConfig::default()).expect("open");
    book.record("T,d,m").expect("record");
    let err = book.get_line(2).expect_err("missing");
    assert_eq!(err.kind(), gatehouse_core::ErrorKind::NotFound);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// After any number of appends the log holds the newest `ceiling`
    /// entries in submission order.
    #[test]
    fn prop_eviction_keeps_newest_in_order(ceiling in 1usize..12, appends in 0usize..40) {
        let config = LogConfig { ceiling, ..LogConfig::default() };
        let store = MemoryStore::new();
        let book = LogBook::open(store.clone(), &config).expect("open");

        for i in 0..appends {
            book.record(&format!("T{i},d,m")).expect("record");
        }

        let expected: Vec<String> =
            (appends.saturating_sub(ceiling)..appends).map(|i| format!("T{i},d,m")).collect();
        prop_assert_eq!(book.count(), expected.len());
        prop_assert_eq!(store.read_all(LOG_TABLE).expect("read"), expected);
    }
}
