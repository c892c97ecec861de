//! Batched upload and purge against a scripted collector.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use gatehouse_core::{
    ErrorKind,
    env::ManualEnv,
    logbook::{LogBook, LogConfig, LogRecord},
    schedule::{DailySync, MIDNIGHT_GUARD},
    sync::{CollectError, Collector, SyncClient, SyncConfig, SyncReport, SyncStatus},
};
use gatehouse_store::{ChaoticStore, MemoryStore};

/// Answers batches from a script (accepting once it runs out) and records
/// every batch it was offered.
#[derive(Default)]
struct ScriptedCollector {
    script: Mutex<VecDeque<Result<(), CollectError>>>,
    batches: Mutex<Vec<Vec<LogRecord>>>,
}

impl ScriptedCollector {
    fn with_script(script: impl IntoIterator<Item = Result<(), CollectError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into_iter().collect()), ..Self::default() })
    }

    fn batches(&self) -> Vec<Vec<LogRecord>> {
        self.batches.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Collector for ScriptedCollector {
    async fn push_batch(&self, records: &[LogRecord]) -> Result<(), CollectError> {
        self.batches.lock().expect("lock").push(records.to_vec());
        self.script.lock().expect("lock").pop_front().unwrap_or(Ok(()))
    }
}

fn evening() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 15).and_then(|d| d.and_hms_opt(23, 58, 0)).expect("valid")
}

/// Log with entries `T1..=Tn` and an environment sized for three-record
/// batches.
fn setup(n: usize) -> (Arc<LogBook<MemoryStore>>, ManualEnv) {
    let book = Arc::new(LogBook::open(MemoryStore::new(), &LogConfig::default()).expect("open"));
    for i in 1..=n {
        book.record(&format!("T{i},2024-06-15 12:00:00,entry {i}")).expect("record");
    }
    let env = ManualEnv::new(evening());
    env.set_free_memory(3 * 4 * 290);
    (book, env)
}

fn tags(batch: &[LogRecord]) -> Vec<&str> {
    batch.iter().map(|record| record.tag.as_str()).collect()
}

#[tokio::test]
async fn rejected_second_batch_leaves_it_in_the_log() {
    let (book, env) = setup(5);
    let collector = ScriptedCollector::with_script([
        Ok(()),
        Err(CollectError::Rejected { status: 500 }),
    ]);
    let client =
        SyncClient::new(Arc::clone(&book), Arc::clone(&collector), env, SyncConfig::default());

    let report = client.sync_all(true).await.expect("sync");

    assert_eq!(report, SyncReport { batches: 2, accepted: 1, pushed: 3, deleted: 3 });
    assert_eq!(report.status(), SyncStatus::Partial);
    assert_eq!(book.count(), 2);
    assert_eq!(book.get_line(1).expect("line"), "T4,2024-06-15 12:00:00,entry 4");

    let batches = collector.batches();
    assert_eq!(tags(&batches[0]), ["T1", "T2", "T3"]);
    assert_eq!(tags(&batches[1]), ["T4", "T5"]);
}

#[tokio::test]
async fn complete_run_empties_the_log() {
    let (book, env) = setup(7);
    let collector = ScriptedCollector::with_script([]);
    let client =
        SyncClient::new(Arc::clone(&book), Arc::clone(&collector), env, SyncConfig::default());

    let report = client.sync_all(true).await.expect("sync");

    assert_eq!(report, SyncReport { batches: 3, accepted: 3, pushed: 7, deleted: 7 });
    assert_eq!(report.status(), SyncStatus::Complete);
    assert_eq!(book.count(), 0);
    assert_eq!(collector.batches().iter().map(Vec::len).collect::<Vec<_>>(), [3, 3, 1]);
}

#[tokio::test]
async fn unreachable_collector_fails_every_batch() {
    let (book, env) = setup(4);
    let down = || Err(CollectError::Unreachable("connection refused".into()));
    let collector = ScriptedCollector::with_script([down(), down()]);
    let client =
        SyncClient::new(Arc::clone(&book), Arc::clone(&collector), env, SyncConfig::default());

    let report = client.sync_all(true).await.expect("sync");

    assert_eq!(report, SyncReport { batches: 2, accepted: 0, pushed: 0, deleted: 0 });
    assert_eq!(report.status(), SyncStatus::Failed);
    assert_eq!(book.count(), 4);
}

#[tokio::test]
async fn upload_without_delete_keeps_entries() {
    let (book, env) = setup(5);
    let collector = ScriptedCollector::with_script([]);
    let client =
        SyncClient::new(Arc::clone(&book), Arc::clone(&collector), env, SyncConfig::default());

    let report = client.sync_all(false).await.expect("sync");

    assert_eq!(report, SyncReport { batches: 2, accepted: 2, pushed: 5, deleted: 0 });
    assert_eq!(book.count(), 5);
    assert_eq!(tags(&collector.batches()[1]), ["T4", "T5"]);
}

#[tokio::test]
async fn empty_log_is_complete_without_batches() {
    let (book, env) = setup(0);
    let collector = ScriptedCollector::with_script([]);
    let client = SyncClient::new(book, Arc::clone(&collector), env, SyncConfig::default());

    let report = client.sync_all(true).await.expect("sync");
    assert_eq!(report, SyncReport::default());
    assert_eq!(report.status(), SyncStatus::Complete);
    assert!(collector.batches().is_empty());
}

#[tokio::test]
async fn storage_failure_aborts_the_run() {
    let store = ChaoticStore::new(MemoryStore::new(), 0.0);
    let book = Arc::new(LogBook::open(store.clone(), &LogConfig::default()).expect("open"));
    book.record("T1,2024-06-15 12:00:00,entry").expect("record");
    store.set_failure_rate(1.0);

    let collector = ScriptedCollector::with_script([]);
    let env = ManualEnv::new(evening());
    let client = SyncClient::new(book, Arc::clone(&collector), env, SyncConfig::default());

    let err = client.sync_all(true).await.expect_err("read fails");
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert!(collector.batches().is_empty());
}

#[tokio::test]
async fn push_one_sends_a_single_record() {
    let (book, env) = setup(0);
    let collector = ScriptedCollector::with_script([Err(CollectError::Rejected { status: 404 })]);
    let client = SyncClient::new(book, Arc::clone(&collector), env, SyncConfig::default());

    let record = LogRecord::parse("SERVICE,2024-06-15 12:00:00,hello");
    let err = client.push_one(record.clone()).await.expect_err("rejected");
    assert_eq!(err.kind(), ErrorKind::Rejected);

    client.push_one(record.clone()).await.expect("accepted");
    assert_eq!(collector.batches(), vec![vec![record.clone()], vec![record]]);
}

#[tokio::test]
async fn nightly_cycle_waits_for_midnight_then_guards() {
    let (book, env) = setup(2);
    let collector = ScriptedCollector::with_script([]);
    let client = Arc::new(SyncClient::new(
        Arc::clone(&book),
        Arc::clone(&collector),
        env.clone(),
        SyncConfig::default(),
    ));
    let nightly = DailySync::new(client, env.clone(), MIDNIGHT_GUARD);

    let report = nightly.cycle().await.expect("report");

    assert_eq!(report.deleted, 2);
    assert_eq!(book.count(), 0);
    assert_eq!(env.sleeps(), [Duration::from_secs(120), MIDNIGHT_GUARD]);
    assert_eq!(env.resync_count(), 1);

    // 23:58:00 + 120 s lands on midnight, then the guard moves past it.
    let expected = NaiveDate::from_ymd_opt(2024, 6, 16).and_then(|d| d.and_hms_opt(0, 2, 0));
    assert_eq!(Some(gatehouse_core::env::Environment::local_now(&env)), expected);
}
