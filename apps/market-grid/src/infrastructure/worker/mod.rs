//! Offload Worker
//!
//! Moves decoding, merging and ranking off the presentation context. The
//! worker is a dedicated OS thread running a current-thread Tokio runtime;
//! it owns its own ingestion channel, entity store and rank stage and talks
//! to the presentation side only through two bounded queues.
//!
//! ```text
//! presentation                         worker thread
//! ────────────                         ─────────────
//! connect() ──WorkerCommand::Connect──> WorkerSession::open
//!                                         IngestionChannel ─> EntityStore ─> rank
//! recv()   <──WorkerMessage::Status──── on every transition
//!          <──WorkerMessage::Data────── after snapshot and every batch
//! terminate() ─────cancel + join──────> session closed, thread exits
//! ```
//!
//! Session state lives in a [`WorkerSession`] created on `Connect` and
//! dropped on disconnect or terminate, so nothing survives from one
//! connect cycle to the next.

mod protocol;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle as TaskHandle;
use tokio_util::sync::CancellationToken;

pub use protocol::{WorkerCommand, WorkerMessage};

use crate::application::ports::{ChannelEvent, Connector};
use crate::application::services::StreamStatus;
use crate::domain::ConnectionState;
use crate::domain::ranking::RankedView;
use crate::domain::record::Record;
use crate::domain::store::EntityStore;
use crate::infrastructure::metrics::{self, Context, WorkerOutbound};
use crate::infrastructure::stream::IngestionChannel;

const THREAD_NAME: &str = "market-grid-worker";

// =============================================================================
// Error Type
// =============================================================================

/// Offload worker errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker runtime could not be built.
    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The command queue is full.
    #[error("worker command queue full")]
    Busy,

    /// The worker has been terminated.
    #[error("worker terminated")]
    Terminated,
}

// =============================================================================
// Handle
// =============================================================================

/// Presentation-side handle to the offload worker.
///
/// Dropping the handle terminates the worker.
pub struct OffloadWorker {
    commands: mpsc::Sender<WorkerCommand>,
    cancel: CancellationToken,
    thread: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl OffloadWorker {
    /// Start the worker thread.
    ///
    /// Returns the handle and the receiver for everything the worker
    /// publishes. `capacity` bounds both the outbound queue and the
    /// worker's internal event queue. Undecodable frames never cross the
    /// queue; they are counted in `status` instead.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError` if the runtime or the thread cannot be created.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        capacity: usize,
        status: Arc<StreamStatus>,
    ) -> Result<(Self, mpsc::Receiver<WorkerMessage>), WorkerError> {
        let capacity = capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (message_tx, message_rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(WorkerError::Runtime)?;

        let context = WorkerContext {
            connector,
            commands: command_rx,
            outbound: message_tx,
            cancel: cancel.clone(),
            capacity,
            status,
            session: None,
        };

        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(context.run()))
            .map_err(WorkerError::Spawn)?;

        tracing::info!(capacity, "Offload worker spawned");

        Ok((
            Self {
                commands: command_tx,
                cancel,
                thread: parking_lot::Mutex::new(Some(thread)),
            },
            message_rx,
        ))
    }

    /// Ask the worker to open a stream session.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Terminated` after termination and
    /// `WorkerError::Busy` if the command queue is full.
    pub fn connect(&self) -> Result<(), WorkerError> {
        self.post(WorkerCommand::Connect)
    }

    /// Post a command without waiting.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Terminated` after termination and
    /// `WorkerError::Busy` if the command queue is full.
    pub fn post(&self, command: WorkerCommand) -> Result<(), WorkerError> {
        if self.cancel.is_cancelled() {
            return Err(WorkerError::Terminated);
        }
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => WorkerError::Busy,
            TrySendError::Closed(_) => WorkerError::Terminated,
        })
    }

    /// Stop the worker, close its stream and join the thread.
    ///
    /// Safe to call any number of times.
    pub fn terminate(&self) {
        self.cancel.cancel();

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Offload worker thread panicked");
            } else {
                tracing::info!("Offload worker terminated");
            }
        }
    }

    /// Whether `terminate` has been called.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for OffloadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

// =============================================================================
// Worker Context
// =============================================================================

/// Per-connection state, owned by the worker thread.
struct WorkerSession {
    store: EntityStore,
    events: mpsc::Receiver<ChannelEvent>,
    cancel: CancellationToken,
    task: TaskHandle<()>,
    connected: bool,
}

impl WorkerSession {
    fn apply_snapshot(&mut self, records: Vec<Record>) -> RankedView {
        let started = Instant::now();
        let count = self.store.apply_snapshot(records);
        metrics::record_merge(Context::Worker, count, 0, started.elapsed());
        metrics::set_store_records(Context::Worker, count);
        tracing::info!(records = count, "Worker snapshot applied");
        self.rank()
    }

    fn apply_batch(&mut self, batch: Vec<Record>) -> RankedView {
        let started = Instant::now();
        let stats = self.store.apply_batch(batch);
        metrics::record_merge(Context::Worker, stats.applied, stats.ignored, started.elapsed());
        self.rank()
    }

    fn rank(&self) -> RankedView {
        let started = Instant::now();
        let view = self.store.rank();
        metrics::record_rank(Context::Worker, started.elapsed());
        view
    }
}

enum Step {
    Stop,
    Command(WorkerCommand),
    Event(Option<ChannelEvent>),
}

struct WorkerContext {
    connector: Arc<dyn Connector>,
    commands: mpsc::Receiver<WorkerCommand>,
    outbound: mpsc::Sender<WorkerMessage>,
    cancel: CancellationToken,
    capacity: usize,
    status: Arc<StreamStatus>,
    session: Option<WorkerSession>,
}

impl WorkerContext {
    async fn run(mut self) {
        tracing::debug!("Offload worker running");

        loop {
            let step = tokio::select! {
                () = self.cancel.cancelled() => Step::Stop,
                command = self.commands.recv() => command.map_or(Step::Stop, Step::Command),
                event = next_event(&mut self.session) => Step::Event(event),
            };

            match step {
                Step::Stop => break,
                Step::Command(WorkerCommand::Connect) => self.open_session(),
                Step::Event(event) => {
                    if !self.handle(event).await {
                        break;
                    }
                }
            }
        }

        if self.close_session().await {
            let _ = self
                .outbound
                .try_send(WorkerMessage::Status(ConnectionState::Disconnected));
        }
        tracing::debug!("Offload worker stopped");
    }

    fn open_session(&mut self) {
        if self.session.is_some() {
            tracing::debug!("Connect ignored, session already live");
            return;
        }

        let (event_tx, events) = mpsc::channel(self.capacity);
        let cancel = self.cancel.child_token();
        let channel = IngestionChannel::new(Arc::clone(&self.connector), event_tx, cancel.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = channel.run().await {
                tracing::warn!(error = %e, "Worker stream session ended with error");
            }
        });

        self.session = Some(WorkerSession {
            store: EntityStore::new(),
            events,
            cancel,
            task,
            connected: false,
        });
    }

    /// Returns `false` when the presentation side is gone.
    async fn handle(&mut self, event: Option<ChannelEvent>) -> bool {
        let message = match event {
            Some(ChannelEvent::Connected) => {
                if let Some(session) = self.session.as_mut() {
                    session.connected = true;
                }
                Some(WorkerMessage::Status(ConnectionState::Connected))
            }
            Some(ChannelEvent::Snapshot(records)) => self
                .session
                .as_mut()
                .map(|session| WorkerMessage::Data(session.apply_snapshot(records))),
            Some(ChannelEvent::Update(batch)) => self
                .session
                .as_mut()
                .map(|session| WorkerMessage::Data(session.apply_batch(batch))),
            Some(ChannelEvent::DecodeError(reason)) => {
                self.status.increment_decode_errors();
                tracing::debug!(reason = %reason, "Worker skipped undecodable message");
                None
            }
            Some(ChannelEvent::Disconnected) | None => {
                let was_connected = self.close_session().await;
                was_connected.then_some(WorkerMessage::Status(ConnectionState::Disconnected))
            }
        };

        match message {
            Some(message) => self.publish(message).await,
            None => true,
        }
    }

    async fn publish(&self, message: WorkerMessage) -> bool {
        let kind = match &message {
            WorkerMessage::Status(_) => WorkerOutbound::Status,
            WorkerMessage::Data(_) => WorkerOutbound::Data,
        };

        tokio::select! {
            () = self.cancel.cancelled() => false,
            sent = self.outbound.send(message) => {
                if sent.is_ok() {
                    metrics::record_worker_message(kind);
                    true
                } else {
                    tracing::warn!("Worker receiver dropped, stopping");
                    false
                }
            }
        }
    }

    /// Tear the session down. Returns whether it was connected.
    async fn close_session(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };

        session.cancel.cancel();
        if let Err(e) = session.task.await {
            tracing::error!(error = %e, "Worker stream task failed");
        }
        tracing::debug!(records = session.store.len(), "Worker session closed");
        session.connected
    }
}

async fn next_event(session: &mut Option<WorkerSession>) -> Option<ChannelEvent> {
    match session {
        Some(session) => session.events.recv().await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infrastructure::stream::{MemoryConnector, StreamMessage};

    fn record(id: &str, price: f64, change: f64) -> Record {
        Record {
            id: id.to_string(),
            symbol: "AMZN".to_string(),
            category: "Consumer".to_string(),
            price,
            volume: 10,
            change,
            timestamp: 0,
        }
    }

    fn status() -> Arc<StreamStatus> {
        Arc::new(StreamStatus::new())
    }

    async fn next(rx: &mut mpsc::Receiver<WorkerMessage>) -> WorkerMessage {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    fn data(message: WorkerMessage) -> RankedView {
        match message {
            WorkerMessage::Data(view) => view,
            other => panic!("expected DATA, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publishes_status_and_ranked_data() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (worker, mut rx) = OffloadWorker::spawn(connector, 8, status()).unwrap();

        worker.connect().unwrap();
        assert_eq!(
            next(&mut rx).await,
            WorkerMessage::Status(ConnectionState::Connected)
        );

        feed.send(&StreamMessage::Snapshot(vec![
            record("a", 1.0, 0.1),
            record("b", 2.0, 0.2),
        ]))
        .await
        .unwrap();
        let view = data(next(&mut rx).await);
        assert_eq!(view[0].id, "b");

        feed.send(&StreamMessage::Update(vec![record("a", 1.5, -0.9)]))
            .await
            .unwrap();
        let view = data(next(&mut rx).await);
        assert_eq!(view[0].id, "a");
        assert_eq!(view.len(), 2);

        drop(feed);
        assert_eq!(
            next(&mut rx).await,
            WorkerMessage::Status(ConnectionState::Disconnected)
        );

        worker.terminate();
    }

    #[tokio::test]
    async fn received_data_never_aliases_worker_store() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (worker, mut rx) = OffloadWorker::spawn(connector, 8, status()).unwrap();
        worker.connect().unwrap();
        next(&mut rx).await;

        feed.send(&StreamMessage::Snapshot(vec![
            record("a", 10.0, 0.5),
            record("b", 20.0, 0.1),
        ]))
        .await
        .unwrap();
        let mut first = data(next(&mut rx).await);
        first.records_mut()[0].price = -1.0;
        first.records_mut()[0].change = 99.0;

        feed.send(&StreamMessage::Update(vec![record("b", 21.0, 0.2)]))
            .await
            .unwrap();
        let second = data(next(&mut rx).await);

        let a = second.iter().find(|r| r.id == "a").unwrap();
        assert!((a.price - 10.0).abs() < f64::EPSILON);
        assert!((a.change - 0.5).abs() < f64::EPSILON);

        worker.terminate();
    }

    #[tokio::test]
    async fn connect_while_live_is_ignored() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (worker, mut rx) = OffloadWorker::spawn(
            Arc::clone(&connector) as Arc<dyn Connector>,
            8,
            status(),
        )
        .unwrap();

        worker.connect().unwrap();
        next(&mut rx).await;
        worker.connect().unwrap();
        feed.send(&StreamMessage::Snapshot(vec![record("a", 1.0, 0.0)]))
            .await
            .unwrap();
        data(next(&mut rx).await);

        assert_eq!(connector.connects(), 1);
        worker.terminate();
    }

    #[tokio::test]
    async fn reconnect_starts_with_fresh_store() {
        let connector = Arc::new(MemoryConnector::new());
        let first = connector.open_session(8);
        let second = connector.open_session(8);
        let (worker, mut rx) = OffloadWorker::spawn(
            Arc::clone(&connector) as Arc<dyn Connector>,
            8,
            status(),
        )
        .unwrap();

        worker.connect().unwrap();
        next(&mut rx).await;
        first
            .send(&StreamMessage::Snapshot(vec![record("a", 1.0, 0.0)]))
            .await
            .unwrap();
        assert_eq!(data(next(&mut rx).await).len(), 1);
        drop(first);
        next(&mut rx).await;

        worker.connect().unwrap();
        assert_eq!(
            next(&mut rx).await,
            WorkerMessage::Status(ConnectionState::Connected)
        );
        second
            .send(&StreamMessage::Update(vec![record("a", 2.0, 0.0)]))
            .await
            .unwrap();

        assert!(data(next(&mut rx).await).is_empty());
        worker.terminate();
    }

    #[tokio::test]
    async fn terminate_is_idempotent_and_releases_channel() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (worker, mut rx) = OffloadWorker::spawn(connector, 8, status()).unwrap();
        worker.connect().unwrap();
        next(&mut rx).await;

        worker.terminate();
        worker.terminate();

        assert!(worker.is_terminated());
        assert!(feed.is_closed());
        assert!(matches!(worker.connect(), Err(WorkerError::Terminated)));
        drop(worker);
    }

    #[tokio::test]
    async fn failed_connect_publishes_nothing() {
        let connector = Arc::new(MemoryConnector::new());
        let (worker, mut rx) = OffloadWorker::spawn(connector, 8, status()).unwrap();
        worker.connect().unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(waited.is_err());
        worker.terminate();
    }

    #[tokio::test]
    async fn undecodable_frames_are_counted_and_session_stays_open() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let shared = status();
        let (worker, mut rx) = OffloadWorker::spawn(connector, 8, Arc::clone(&shared)).unwrap();
        worker.connect().unwrap();
        next(&mut rx).await;

        feed.send(&StreamMessage::Snapshot(vec![record("a", 1.0, 0.1)]))
            .await
            .unwrap();
        data(next(&mut rx).await);

        feed.send_text("{not json").await.unwrap();
        feed.send_text(r#"{"type":"UPDATE""#).await.unwrap();
        feed.send(&StreamMessage::Update(vec![record("a", 2.0, -0.7)]))
            .await
            .unwrap();

        // The next message after the bad frames is the batch's DATA.
        let view = data(next(&mut rx).await);
        assert_eq!(view.len(), 1);
        assert!((view[0].price - 2.0).abs() < f64::EPSILON);
        assert_eq!(shared.decode_errors(), 2);
        assert!(!feed.is_closed());

        worker.terminate();
    }
}
