//! Backend module: serial ingestion and the engine control surface
//!
//! Ingestion runs in a separate thread to keep the UI responsive. The UI
//! thread talks to it through crossbeam channels and reads the shared
//! [`SignalStore`] directly.
//!
//! # Architecture
//!
//! - [`BackendCommand`] - Messages sent from the UI to the worker (clear, shutdown)
//! - [`EngineEvent`] - Messages sent from the worker to the UI (status, schema, stats)
//! - [`ScopeEngine`] - UI-side handle: connect, disconnect, clear, view selection
//! - [`IngestionWorker`] - The per-connection read loop
//!
//! # Components
//!
//! - [`LineSource`] - Transport yielding text lines (serial, reader, scripted)
//! - [`HeaderDetector`] - Decides header vs. row for each line
//! - [`parse_row`] - Strict numeric row parsing
//! - [`SignalStore`] - Bounded per-column ring buffers
//!
//! # Example
//!
//! ```ignore
//! use csvscope::backend::{EngineEvent, ScopeEngine};
//! use csvscope::config::AppConfig;
//!
//! let mut engine = ScopeEngine::new(AppConfig::default());
//! engine.connect("/dev/ttyACM0")?;
//!
//! // Once per frame
//! for event in engine.poll() {
//!     if let EngineEvent::SchemaChanged(columns) = event {
//!         println!("columns: {:?}", columns);
//!     }
//! }
//! let samples = engine.store().snapshot("AccX");
//! ```

pub mod detector;
pub mod line_source;
#[cfg(feature = "mock-source")]
pub mod mock_source;
pub mod row_parser;
pub mod store;
pub mod worker;

pub use detector::{is_header_candidate, DetectorCounters, HeaderDetector, LineClass};
pub use line_source::{
    available_ports, open_line_source, LineAssembler, LineSource, ReadOutcome, ReaderLineSource,
    ScriptEnd, ScriptedLineSource, SerialLineSource, SIMULATED_ADDRESS_PREFIX,
};
#[cfg(feature = "mock-source")]
pub use mock_source::{SimPattern, SimulatedLineSource};
pub use row_parser::{parse_number, parse_row};
pub use store::{ColumnStats, SignalStore, StoreSnapshot, MIN_CAPACITY};
pub use worker::IngestionWorker;

use crate::config::{AppConfig, ScaleMode, ViewSettings};
use crate::error::{Result, RowError, ScopeError};
use crate::types::{ConnectionStatus, IngestStats, Schema, SessionState};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Capacity of the UI to worker command queue
const COMMAND_QUEUE_LEN: usize = 64;

/// Message sent from the UI to the ingestion worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    /// Drop all samples and wait for a new header; keep the connection
    Clear,
    /// Stop the ingestion loop
    Shutdown,
}

/// Message sent from the ingestion worker to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Connection status changed
    ConnectionStatus(ConnectionStatus),
    /// Connection error occurred
    ConnectionError(String),
    /// A header established a new schema; buffers were reset
    SchemaChanged(Vec<String>),
    /// Rows were appended since the last notification
    SamplesAppended { generation: u64, total_rows: u64 },
    /// The transport dropped; ingestion stopped
    Disconnected(String),
    /// Statistics update
    Stats(IngestStats),
    /// A data line was rejected
    RowRejected { line: String, error: RowError },
}

/// Channels and thread of one running connection
struct WorkerHandle {
    command_tx: Sender<BackendCommand>,
    event_rx: Receiver<EngineEvent>,
    running: Arc<AtomicBool>,
    thread: JoinHandle<IngestStats>,
}

impl WorkerHandle {
    fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    fn send(&self, command: BackendCommand) -> Result<()> {
        self.command_tx
            .try_send(command)
            .map_err(|e| ScopeError::Channel(e.to_string()))
    }
}

/// Control surface owned by the UI thread.
///
/// Holds the session state explicitly: the shared [`SignalStore`], the view
/// selection, the last status and statistics. At most one connection is
/// active at a time.
pub struct ScopeEngine {
    config: AppConfig,
    store: SignalStore,
    view: ViewSettings,
    status: ConnectionStatus,
    stats: IngestStats,
    last_error: Option<String>,
    address: Option<String>,
    connected_at: Option<chrono::DateTime<chrono::Local>>,
    worker: Option<WorkerHandle>,
    /// Store generation the view selection was last checked against
    seen_generation: u64,
}

impl ScopeEngine {
    /// Create a disconnected engine
    pub fn new(config: AppConfig) -> Self {
        let store = SignalStore::new(config.ingest.capacity);
        let seen_generation = store.generation();
        Self {
            config,
            store,
            view: ViewSettings::default(),
            status: ConnectionStatus::Disconnected,
            stats: IngestStats::default(),
            last_error: None,
            address: None,
            connected_at: None,
            worker: None,
            seen_generation,
        }
    }

    /// Open the transport named by `address` and start ingesting.
    ///
    /// Fails with [`ScopeError::Connection`] if a connection is already
    /// active or the transport cannot be opened. The store is reset, so no
    /// history survives from a previous session.
    pub fn connect(&mut self, address: &str) -> Result<()> {
        self.ensure_idle()?;

        let address = address.trim();
        let source = match open_line_source(address, &self.config.serial) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Failed to connect to {:?}: {}", address, e);
                self.status = ConnectionStatus::Error;
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        // The simulator does not reset on open
        let settle_delay = if address.starts_with(SIMULATED_ADDRESS_PREFIX) {
            Duration::ZERO
        } else {
            Duration::from_millis(self.config.serial.settle_delay_ms)
        };
        self.start_worker(source, address.to_string(), settle_delay)
    }

    /// Start ingesting from an already opened source, without a settle delay
    pub fn connect_with_source(&mut self, source: Box<dyn LineSource>) -> Result<()> {
        self.ensure_idle()?;
        let name = source.describe();
        self.start_worker(source, name, Duration::ZERO)
    }

    fn ensure_idle(&mut self) -> Result<()> {
        self.reap_finished_worker();
        if self.worker.is_some() {
            return Err(ScopeError::Connection(format!(
                "Already connected to {}",
                self.address.as_deref().unwrap_or("a device")
            )));
        }
        Ok(())
    }

    fn start_worker(
        &mut self,
        source: Box<dyn LineSource>,
        address: String,
        settle_delay: Duration,
    ) -> Result<()> {
        self.store.clear();
        self.stats = IngestStats::default();
        self.last_error = None;

        let (command_tx, command_rx) = bounded(COMMAND_QUEUE_LEN);
        let (event_tx, event_rx) = bounded(self.config.ingest.event_queue_len.max(1));
        let running = Arc::new(AtomicBool::new(true));

        let worker = IngestionWorker::new(
            source,
            self.store.clone(),
            &self.config.ingest,
            settle_delay,
            command_rx,
            event_tx,
            running.clone(),
        );
        let thread = std::thread::Builder::new()
            .name("csvscope-ingest".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                ScopeError::Connection(format!("Failed to spawn ingestion thread: {}", e))
            })?;

        tracing::info!("Connecting to {}", address);
        self.status = ConnectionStatus::Connecting;
        self.address = Some(address);
        self.connected_at = Some(chrono::Local::now());
        self.worker = Some(WorkerHandle {
            command_tx,
            event_rx,
            running,
            thread,
        });
        self.sync_view();
        Ok(())
    }

    /// Stop ingestion and close the transport. Calling it again has no effect.
    ///
    /// Blocks until the worker has exited, which takes at most one read
    /// timeout.
    pub fn disconnect(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::SeqCst);
            let _ = worker.command_tx.try_send(BackendCommand::Shutdown);
            self.join_worker(worker);
            tracing::info!(
                "Disconnected from {}",
                self.address.as_deref().unwrap_or("device")
            );
        }
        self.status = ConnectionStatus::Disconnected;
        self.connected_at = None;
    }

    /// Discard all samples and wait for a new header.
    ///
    /// While connected the worker performs the reset between two lines, so
    /// the store is cleared shortly after this returns.
    pub fn clear(&mut self) {
        match &self.worker {
            Some(worker) if !worker.is_finished() => {
                if let Err(e) = worker.send(BackendCommand::Clear) {
                    tracing::warn!("Failed to clear ingestion worker: {}", e);
                }
            }
            _ => {
                self.store.clear();
                self.stats = IngestStats::default();
            }
        }
    }

    /// Select the plotted signal. Returns false if the schema has no such column.
    pub fn select_signal(&mut self, name: &str) -> bool {
        let schema = self.store.schema();
        self.view.select_signal(&schema, name)
    }

    pub fn select_scale_mode(&mut self, mode: ScaleMode) {
        self.view.select_scale_mode(mode);
    }

    /// Replace the view settings, e.g. with ones restored from disk
    pub fn restore_view(&mut self, view: ViewSettings) {
        self.view = view;
        let schema = self.store.schema();
        if !schema.is_empty() {
            self.view.on_schema_changed(&schema);
        }
    }

    /// Drain pending worker events without blocking.
    ///
    /// Updates status, statistics, last error and view selection, then
    /// returns the events for the viewer.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let mut finished = None;

        if let Some(worker) = &self.worker {
            events.extend(worker.event_rx.try_iter());
            if worker.is_finished() {
                // Anything sent between the drain and the exit
                events.extend(worker.event_rx.try_iter());
                finished = self.worker.take();
            }
        }

        for event in &events {
            self.apply_event(event);
        }

        if let Some(worker) = finished {
            self.join_worker(worker);
            if self.status.is_active() {
                self.status = ConnectionStatus::Lost;
            }
        }

        self.sync_view();
        events
    }

    fn apply_event(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::ConnectionStatus(status) => self.status = *status,
            EngineEvent::ConnectionError(msg) => self.last_error = Some(msg.clone()),
            EngineEvent::Disconnected(reason) => {
                self.status = ConnectionStatus::Lost;
                self.last_error = Some(reason.clone());
            }
            EngineEvent::Stats(stats) => self.stats = stats.clone(),
            EngineEvent::SchemaChanged(_)
            | EngineEvent::SamplesAppended { .. }
            | EngineEvent::RowRejected { .. } => {}
        }
    }

    /// Re-validate the selection when the store moved to a new schema
    fn sync_view(&mut self) {
        let generation = self.store.generation();
        if generation != self.seen_generation {
            self.seen_generation = generation;
            let schema = self.store.schema();
            self.view.on_schema_changed(&schema);
        }
    }

    /// Join a worker whose thread has been asked to stop (or already stopped)
    fn join_worker(&mut self, worker: WorkerHandle) {
        match worker.thread.join() {
            Ok(stats) => self.stats = stats,
            Err(_) => {
                tracing::error!("Ingestion thread panicked");
                self.status = ConnectionStatus::Error;
                self.last_error = Some("ingestion thread panicked".to_string());
            }
        }
    }

    fn reap_finished_worker(&mut self) {
        if self.worker.as_ref().is_some_and(WorkerHandle::is_finished) {
            self.poll();
        }
    }

    // ==================== Queries ====================

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether an ingestion worker is running
    pub fn is_connected(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// `AwaitingHeader` until the store holds a schema
    pub fn session_state(&self) -> SessionState {
        if self.store.schema().is_empty() {
            SessionState::AwaitingHeader
        } else {
            SessionState::Streaming
        }
    }

    pub fn schema(&self) -> Schema {
        self.store.schema()
    }

    /// Latest statistics published by the worker
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Shared handle for reading snapshots
    pub fn store(&self) -> &SignalStore {
        &self.store
    }

    pub fn view(&self) -> &ViewSettings {
        &self.view
    }

    /// Address of the current or last connection
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Last connection error or disconnect reason
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Local time the current connection was made
    pub fn connected_at(&self) -> Option<chrono::DateTime<chrono::Local>> {
        self.connected_at
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Human-readable header detection status
    pub fn detection_status(&self) -> String {
        let schema = self.store.schema();
        if schema.is_empty() {
            "Waiting for CSV header detection...".to_string()
        } else {
            format!("Detected {} columns: {}", schema.arity(), schema)
        }
    }

    /// Window statistics of the plotted signal
    pub fn selected_stats(&self) -> Option<ColumnStats> {
        let name = self.view.selected_signal.as_deref()?;
        self.store.column_stats(name)
    }
}

impl Drop for ScopeEngine {
    fn drop(&mut self) {
        self.disconnect();
    }
}
