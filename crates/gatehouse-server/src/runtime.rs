//! Worker wiring.
//!
//! ```text
//!   tokio runtime                        OS threads
//!   ─────────────                        ──────────
//!   LogConsumer (log queue -> logs.txt)  radio task (radio queue -> transceiver)
//!   DailySync  (midnight sync-and-purge) message handler (message queue -> authorize)
//! ```
//!
//! The radio runs on the simulated transceiver in loopback: every
//! transmission is acknowledged at once, and inbound payloads are injected
//! through [`Gatehouse::air`].

use std::{sync::Arc, thread, time::Duration};

use gatehouse_core::{
    access::AccessControl,
    dispatch::{ControlPlane, SERVICE_TAG},
    env::Environment,
    logbook::{LogBook, LogConsumer, LogSubmitter},
    radio::{
        MessageHandler, RadioError, RadioHandle, RadioTask, SimulatedTransceiver, TxOutcome,
        message_queue,
    },
    schedule::{DailySync, MIDNIGHT_GUARD},
    sync::{Collector, SyncClient},
};
use gatehouse_store::FileStore;
use tokio::task::JoinHandle;

use crate::{Config, ServerError};

/// A running master node.
pub struct Gatehouse<C: Collector, E: Environment> {
    control: ControlPlane<FileStore, C, E>,
    book: Arc<LogBook<FileStore>>,
    logs: LogSubmitter<E>,
    air: SimulatedTransceiver,
    radio: RadioHandle,
    radio_thread: thread::JoinHandle<()>,
    handler_thread: thread::JoinHandle<()>,
    consumer: JoinHandle<()>,
    nightly: JoinHandle<()>,
}

impl<C: Collector, E: Environment> Gatehouse<C, E> {
    /// Open the tables under `config.data_dir` and start every worker.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Malformed access tables, an unreadable data directory or a bad radio
    /// configuration abort startup.
    pub fn start(config: &Config, collector: C, env: E) -> Result<Self, ServerError> {
        let store = FileStore::open(&config.data_dir)?;
        let access = Arc::new(AccessControl::open(store.clone(), config.access)?);
        let book = Arc::new(LogBook::open(store, &config.log)?);
        tracing::info!(
            keys = access.key_count(),
            devices = access.device_count(),
            log_lines = book.count(),
            "tables loaded"
        );

        let (logs, consumer) = LogConsumer::channel(Arc::clone(&book), env.clone(), &config.log);
        let consumer = tokio::spawn(consumer.run());

        let sync =
            Arc::new(SyncClient::new(Arc::clone(&book), collector, env.clone(), config.sync));
        let nightly = tokio::spawn(DailySync::new(Arc::clone(&sync), env, MIDNIGHT_GUARD).run());

        let air = SimulatedTransceiver::new();
        air.set_auto_complete(Some(TxOutcome::Acknowledged));
        let (messages_tx, messages) = message_queue(&config.radio);
        let (task, radio, line) = RadioTask::new(air.clone(), &config.radio, messages_tx)?;
        air.attach(line);

        let radio_thread =
            thread::Builder::new().name("radio".to_string()).spawn(move || task.run())?;
        let handler = MessageHandler::new(Arc::clone(&access), radio.clone(), logs.clone());
        let handler_thread = thread::Builder::new()
            .name("radio-messages".to_string())
            .spawn(move || handler.run(messages))?;

        let control = ControlPlane::new(access, radio.clone(), sync, logs.clone());
        logs.submit_or_warn(SERVICE_TAG, "gatehouse started");
        tracing::info!(data_dir = %config.data_dir.display(), "gatehouse running");

        Ok(Self {
            control,
            book,
            logs,
            air,
            radio,
            radio_thread,
            handler_thread,
            consumer,
            nightly,
        })
    }

    /// Command entry point for the operator front-ends.
    pub fn control(&self) -> &ControlPlane<FileStore, C, E> {
        &self.control
    }

    /// The activity log.
    pub fn book(&self) -> &LogBook<FileStore> {
        &self.book
    }

    /// Log submission handle.
    pub fn logs(&self) -> &LogSubmitter<E> {
        &self.logs
    }

    /// The loopback transceiver, to inject payloads from devices.
    pub fn air(&self) -> &SimulatedTransceiver {
        &self.air
    }

    /// Stop every worker and flush the log queue.
    ///
    /// # Errors
    ///
    /// `WorkerPanicked` if a worker died before it could be joined.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        let Self { control, logs, radio, radio_thread, handler_thread, consumer, nightly, .. } =
            self;

        nightly.abort();
        loop {
            match radio.shutdown() {
                Ok(()) | Err(RadioError::Closed) => break,
                Err(err) => {
                    tracing::debug!(%err, "radio queue busy, retrying shutdown");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                },
            }
        }
        join_thread("radio", radio_thread).await?;
        // The handler stops once the radio task drops the message queue.
        join_thread("radio-messages", handler_thread).await?;

        // Dropping the last submitters closes the log queue.
        drop(control);
        drop(logs);
        consumer.await.map_err(|_| ServerError::WorkerPanicked("log consumer"))?;

        tracing::info!("gatehouse stopped");
        Ok(())
    }
}

async fn join_thread(
    name: &'static str,
    handle: thread::JoinHandle<()>,
) -> Result<(), ServerError> {
    tokio::task::spawn_blocking(move || handle.join())
        .await
        .map_err(|_| ServerError::WorkerPanicked(name))?
        .map_err(|_| ServerError::WorkerPanicked(name))
}
