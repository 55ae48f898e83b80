//! Ingestion worker thread
//!
//! This module contains the loop that runs in a separate thread for the
//! lifetime of one connection. It owns the line source and is the single
//! writer of the [`SignalStore`]; the UI thread only reads snapshots.
//!
//! # Responsibilities
//!
//! - **Settling**: waits for boards that reset when the port opens
//! - **Classification**: feeds every line through the [`HeaderDetector`]
//! - **Storage**: appends rows, resets buffers on a new header
//! - **Statistics**: counts lines, rows, rejects and publishes [`IngestStats`]
//! - **Shutdown**: stops on the running flag or when the transport drops
//!
//! # Backpressure
//!
//! Events are sent with `try_send`. When the UI falls behind, events are
//! dropped and counted in [`IngestStats::dropped_events`]; ingestion never
//! blocks on the UI.

use crate::backend::detector::{HeaderDetector, LineClass};
use crate::backend::line_source::{LineSource, ReadOutcome};
use crate::backend::store::SignalStore;
use crate::backend::{BackendCommand, EngineEvent};
use crate::config::IngestConfig;
use crate::error::RowError;
use crate::types::{ConnectionStatus, IngestStats, Schema};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest single sleep while settling, so a disconnect is noticed quickly
const SETTLE_SLICE: Duration = Duration::from_millis(20);

/// Minimum spacing of `SamplesAppended` notifications while rows keep coming
const APPEND_NOTIFY_INTERVAL: Duration = Duration::from_millis(10);

/// Period of the warn-level summary of rejected rows
const REJECT_SUMMARY_INTERVAL: Duration = Duration::from_secs(5);

/// The worker that runs the ingestion loop for one connection
pub struct IngestionWorker {
    /// Transport, closed when the loop ends
    source: Box<dyn LineSource>,
    detector: HeaderDetector,
    store: SignalStore,
    /// Command receiver from the UI
    command_rx: Receiver<BackendCommand>,
    /// Event sender to the UI
    event_tx: Sender<EngineEvent>,
    /// Cleared by the UI to request shutdown
    running: Arc<AtomicBool>,
    settle_delay: Duration,
    stats_interval: Duration,
    stats: IngestStats,
    /// Origin of sample timestamps
    session_start: Instant,
    last_stats_time: Instant,
    /// Accepted row count at the last stats publication
    rows_at_last_stats: u64,
    /// Rows appended since the last `SamplesAppended`
    unannounced_rows: u64,
    last_notify_time: Instant,
    rejected_since_summary: u64,
    last_summary_time: Instant,
}

impl IngestionWorker {
    /// Create a worker; nothing happens until [`run`](Self::run)
    pub fn new(
        source: Box<dyn LineSource>,
        store: SignalStore,
        config: &IngestConfig,
        settle_delay: Duration,
        command_rx: Receiver<BackendCommand>,
        event_tx: Sender<EngineEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let now = Instant::now();
        Self {
            source,
            detector: HeaderDetector::new(config.noise_words.as_slice()),
            store,
            command_rx,
            event_tx,
            running,
            settle_delay,
            stats_interval: Duration::from_millis(config.stats_interval_ms.max(1)),
            stats: IngestStats::default(),
            session_start: now,
            last_stats_time: now,
            rows_at_last_stats: 0,
            unannounced_rows: 0,
            last_notify_time: now,
            rejected_since_summary: 0,
            last_summary_time: now,
        }
    }

    /// Run the ingestion loop until shutdown or disconnect.
    ///
    /// Returns the final counters. The source is closed before returning.
    pub fn run(mut self) -> IngestStats {
        let endpoint = self.source.describe();
        tracing::info!("Ingestion worker started on {}", endpoint);

        if self.settle() {
            self.update_connection_status(ConnectionStatus::Connected);
            self.session_start = Instant::now();
            self.last_stats_time = self.session_start;

            while self.is_running() {
                self.process_commands();
                if !self.is_running() {
                    break;
                }

                match self.source.read_line() {
                    Ok(ReadOutcome::Line(line)) => self.handle_line(&line),
                    Ok(ReadOutcome::Idle) => self.announce_rows(),
                    Ok(ReadOutcome::Overflow(len)) => {
                        self.stats.lines_read += 1;
                        let class = self.detector.classify_overflow(len);
                        self.apply_class(&format!("<{} bytes>", len), class);
                    }
                    Err(e) if e.is_disconnect() => {
                        self.announce_rows();
                        tracing::warn!("Connection to {} lost: {}", endpoint, e);
                        self.update_connection_status(ConnectionStatus::Lost);
                        self.try_send_event(EngineEvent::Disconnected(e.to_string()));
                        break;
                    }
                    Err(e) => {
                        self.announce_rows();
                        tracing::error!("Read from {} failed: {}", endpoint, e);
                        self.update_connection_status(ConnectionStatus::Error);
                        self.try_send_event(EngineEvent::ConnectionError(e.to_string()));
                        break;
                    }
                }

                if self.last_stats_time.elapsed() >= self.stats_interval {
                    self.send_stats();
                }
                self.log_reject_summary(false);
            }
        }

        // Cleanup
        self.announce_rows();
        self.source.close();
        self.log_reject_summary(true);
        self.send_stats();

        tracing::info!(
            "Ingestion worker stopped: {} rows accepted, {} rejected",
            self.stats.rows_accepted,
            self.stats.rows_rejected
        );
        self.stats
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait out the settle delay in short slices. Returns false if shutdown
    /// was requested meanwhile.
    fn settle(&mut self) -> bool {
        if self.settle_delay.is_zero() {
            return self.is_running();
        }

        tracing::debug!("Waiting {:?} for the device to settle", self.settle_delay);
        let deadline = Instant::now() + self.settle_delay;
        while self.is_running() {
            self.process_commands();
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SETTLE_SLICE));
        }
        self.is_running()
    }

    /// Process pending commands from the UI
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: BackendCommand) {
        match cmd {
            BackendCommand::Clear => self.clear_data(),
            BackendCommand::Shutdown => {
                tracing::debug!("Shutdown requested");
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Drop all samples and wait for a new header, keeping the connection
    fn clear_data(&mut self) {
        self.unannounced_rows = 0;
        self.detector.reset();
        self.store.clear();
        self.stats = IngestStats {
            dropped_events: self.stats.dropped_events,
            ..IngestStats::default()
        };
        self.rows_at_last_stats = 0;
        self.session_start = Instant::now();
        tracing::info!("Cleared data; waiting for a new header");
        self.send_stats();
    }

    fn handle_line(&mut self, line: &str) {
        self.stats.lines_read += 1;
        let class = self.detector.classify(line);
        self.apply_class(line, class);
    }

    fn apply_class(&mut self, line: &str, class: LineClass) {
        let counters = self.detector.counters();
        self.stats.noise_lines = counters.noise_lines;
        self.stats.headers_detected = counters.headers_detected;
        self.stats.schema_changes = counters.schema_changes;

        match class {
            LineClass::Noise => {
                tracing::trace!("Ignored line: {:?}", line);
            }
            LineClass::SchemaDetected(schema) => {
                tracing::info!("Detected {} columns: {}", schema.arity(), schema);
                self.install_schema(schema);
            }
            LineClass::SchemaChanged(schema) => {
                tracing::info!("Header changed to {} columns: {}", schema.arity(), schema);
                self.install_schema(schema);
            }
            LineClass::Row(values) => {
                match self.store.append(&values, self.session_start.elapsed()) {
                    Ok(_) => {
                        self.stats.rows_accepted += 1;
                        self.unannounced_rows += 1;
                        if self.last_notify_time.elapsed() >= APPEND_NOTIFY_INTERVAL {
                            self.announce_rows();
                        }
                    }
                    // Only reachable if the store and detector disagree on arity
                    Err(e) => tracing::error!("Failed to store row {:?}: {}", line, e),
                }
            }
            LineClass::Malformed(err) => self.reject(line.to_string(), err),
        }
    }

    fn install_schema(&mut self, schema: Schema) {
        self.unannounced_rows = 0;
        let columns = schema.columns().to_vec();
        self.store.reset(schema);
        self.try_send_event(EngineEvent::SchemaChanged(columns));
    }

    fn reject(&mut self, line: String, error: RowError) {
        self.stats.rows_rejected += 1;
        self.rejected_since_summary += 1;
        tracing::debug!("Rejected row {:?}: {}", line, error);
        self.try_send_event(EngineEvent::RowRejected { line, error });
    }

    fn log_reject_summary(&mut self, force: bool) {
        if self.rejected_since_summary == 0 {
            return;
        }
        let elapsed = self.last_summary_time.elapsed();
        if force || elapsed >= REJECT_SUMMARY_INTERVAL {
            tracing::warn!(
                "{} malformed rows in the last {:.1}s",
                self.rejected_since_summary,
                elapsed.as_secs_f64()
            );
            self.rejected_since_summary = 0;
            self.last_summary_time = Instant::now();
        }
    }

    /// Tell the UI about rows appended since the last notification
    fn announce_rows(&mut self) {
        if self.unannounced_rows == 0 {
            return;
        }
        self.unannounced_rows = 0;
        self.last_notify_time = Instant::now();
        self.try_send_event(EngineEvent::SamplesAppended {
            generation: self.store.generation(),
            total_rows: self.store.total_rows(),
        });
    }

    /// Update connection status and notify UI
    fn update_connection_status(&mut self, status: ConnectionStatus) {
        self.try_send_event(EngineEvent::ConnectionStatus(status));
    }

    /// Send statistics to UI, refreshing the row rate first
    fn send_stats(&mut self) {
        let elapsed = self.last_stats_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let rows = self.stats.rows_accepted.saturating_sub(self.rows_at_last_stats);
            self.stats.effective_row_rate = rows as f64 / elapsed;
        }
        self.rows_at_last_stats = self.stats.rows_accepted;
        self.last_stats_time = Instant::now();

        let stats = self.stats.clone();
        self.try_send_event(EngineEvent::Stats(stats));
    }

    /// Try to send an event, tracking dropped events if the queue is full
    fn try_send_event(&mut self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            self.stats.dropped_events += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::line_source::{MockLineSource, ScriptedLineSource};
    use crate::error::{Result, ScopeError};
    use crossbeam_channel::bounded;
    use std::collections::VecDeque;

    struct Harness {
        store: SignalStore,
        command_tx: Sender<BackendCommand>,
        event_rx: Receiver<EngineEvent>,
        running: Arc<AtomicBool>,
    }

    fn create_test_worker(
        source: Box<dyn LineSource>,
        settle_delay: Duration,
        queue_len: usize,
    ) -> (IngestionWorker, Harness) {
        let (command_tx, command_rx) = bounded(16);
        let (event_tx, event_rx) = bounded(queue_len);
        let running = Arc::new(AtomicBool::new(true));
        let store = SignalStore::new(100);

        let worker = IngestionWorker::new(
            source,
            store.clone(),
            &IngestConfig::default(),
            settle_delay,
            command_rx,
            event_tx,
            running.clone(),
        );
        let harness = Harness {
            store,
            command_tx,
            event_rx,
            running,
        };
        (worker, harness)
    }

    fn scripted(lines: &[&str]) -> Box<dyn LineSource> {
        Box::new(ScriptedLineSource::new(lines.iter().copied()))
    }

    fn mock_with_script(script: Vec<Result<ReadOutcome>>) -> MockLineSource {
        let mut script: VecDeque<_> = script.into();
        let mut mock = MockLineSource::new();
        mock.expect_read_line().returning(move || {
            script
                .pop_front()
                .unwrap_or_else(|| Err(ScopeError::Disconnected("unplugged".into())))
        });
        mock.expect_describe().return_const("mock port".to_string());
        mock
    }

    fn line(s: &str) -> Result<ReadOutcome> {
        Ok(ReadOutcome::Line(s.to_string()))
    }

    #[test]
    fn test_concrete_session() {
        let (worker, h) = create_test_worker(
            scripted(&["AccX,AccY,Temp", "1.0,2.0,25", "bad,line", "1.5,2.5,26"]),
            Duration::ZERO,
            64,
        );
        let stats = worker.run();

        assert_eq!(h.store.schema().columns(), &["AccX", "AccY", "Temp"]);
        for column in ["AccX", "AccY", "Temp"] {
            assert_eq!(h.store.snapshot(column).unwrap().len(), 2);
        }
        assert_eq!(stats.rows_accepted, 2);
        assert_eq!(stats.rows_rejected, 1);
        assert_eq!(stats.headers_detected, 1);
        assert_eq!(stats.lines_read, 4);

        let events: Vec<_> = h.event_rx.try_iter().collect();
        assert!(events.contains(&EngineEvent::ConnectionStatus(ConnectionStatus::Connected)));
        assert!(events.contains(&EngineEvent::SchemaChanged(vec![
            "AccX".into(),
            "AccY".into(),
            "Temp".into()
        ])));
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::RowRejected { line, .. } if line == "bad,line")));
        assert!(events.contains(&EngineEvent::ConnectionStatus(ConnectionStatus::Lost)));
        assert!(events.iter().any(|e| matches!(e, EngineEvent::Disconnected(_))));
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::SamplesAppended { total_rows: 2, .. }
        )));
    }

    #[test]
    fn test_noise_before_header_is_counted() {
        let (worker, h) = create_test_worker(
            scripted(&[
                "Initializing sensors...",
                "12,13",
                "Temp",
                "21.5",
                "Calibration failed",
                "22",
            ]),
            Duration::ZERO,
            64,
        );
        let stats = worker.run();
        assert_eq!(stats.noise_lines, 3);
        assert_eq!(stats.rows_accepted, 2);
        assert_eq!(h.store.len(), 2);
    }

    #[test]
    fn test_schema_change_resets_store() {
        let (worker, h) = create_test_worker(
            scripted(&["A,B", "1,2", "3,4", "A,B,C", "5,6,7"]),
            Duration::ZERO,
            64,
        );
        let stats = worker.run();
        assert_eq!(stats.schema_changes, 1);
        assert_eq!(h.store.schema().columns(), &["A", "B", "C"]);
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.store.snapshot("C").unwrap()[0].value, 7.0);
    }

    #[test]
    fn test_idle_and_overflow_reads() {
        let mut mock = mock_with_script(vec![
            line("x,y"),
            Ok(ReadOutcome::Idle),
            line("1,2"),
            Ok(ReadOutcome::Overflow(9000)),
            Ok(ReadOutcome::Idle),
            line("3,4"),
        ]);
        mock.expect_close().times(1).return_const(());

        let (worker, h) = create_test_worker(Box::new(mock), Duration::ZERO, 64);
        let stats = worker.run();

        assert_eq!(stats.rows_accepted, 2);
        assert_eq!(stats.rows_rejected, 1);
        assert!(h.event_rx.try_iter().any(|e| matches!(
            e,
            EngineEvent::RowRejected {
                error: RowError::TooLong { len: 9000 },
                ..
            }
        )));
    }

    #[test]
    fn test_overflow_before_header_is_noise() {
        let mut mock = mock_with_script(vec![
            Ok(ReadOutcome::Overflow(6000)),
            line("x,y"),
            line("1,2"),
        ]);
        mock.expect_close().times(1).return_const(());

        let (worker, h) = create_test_worker(Box::new(mock), Duration::ZERO, 64);
        let stats = worker.run();

        assert_eq!(stats.noise_lines, 1);
        assert_eq!(stats.rows_rejected, 0);
        assert_eq!(stats.rows_accepted, 1);
        assert!(!h
            .event_rx
            .try_iter()
            .any(|e| matches!(e, EngineEvent::RowRejected { .. })));
    }

    #[test]
    fn test_stopped_worker_never_reads() {
        let mut mock = MockLineSource::new();
        mock.expect_read_line().times(0);
        mock.expect_describe().return_const("mock port".to_string());
        mock.expect_close().times(1).return_const(());

        let (worker, h) = create_test_worker(Box::new(mock), Duration::ZERO, 64);
        h.running.store(false, Ordering::SeqCst);
        worker.run();
        assert!(h.store.schema().is_empty());
    }

    #[test]
    fn test_settle_delay_is_cancellable() {
        let mut mock = MockLineSource::new();
        mock.expect_read_line().times(0);
        mock.expect_describe().return_const("mock port".to_string());
        mock.expect_close().times(1).return_const(());

        let (worker, h) = create_test_worker(Box::new(mock), Duration::from_secs(30), 64);
        let started = Instant::now();
        let handle = std::thread::spawn(move || worker.run());

        std::thread::sleep(Duration::from_millis(50));
        h.running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_shutdown_command() {
        let (mut worker, h) = create_test_worker(scripted(&[]), Duration::ZERO, 16);
        h.command_tx.send(BackendCommand::Shutdown).unwrap();
        worker.process_commands();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_dropped_command_channel_stops_worker() {
        let (mut worker, h) = create_test_worker(scripted(&[]), Duration::ZERO, 16);
        drop(h.command_tx);
        worker.process_commands();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_clear_command_keeps_connection() {
        let (mut worker, h) = create_test_worker(scripted(&[]), Duration::ZERO, 64);
        worker.handle_line("A,B");
        worker.handle_line("1,2");
        assert_eq!(h.store.len(), 1);

        h.command_tx.send(BackendCommand::Clear).unwrap();
        worker.process_commands();

        assert!(worker.is_running());
        assert!(h.store.is_empty());
        assert!(h.store.schema().is_empty());
        assert_eq!(worker.stats.rows_accepted, 0);

        assert_eq!(worker.stats.headers_detected, 0);

        // A fresh header is required before rows are accepted again
        worker.handle_line("3,4");
        assert_eq!(worker.stats.noise_lines, 1);
        worker.handle_line("C,D,E");
        worker.handle_line("5,6,7");
        assert_eq!(h.store.schema().columns(), &["C", "D", "E"]);
        assert_eq!(h.store.len(), 1);
        assert_eq!(worker.stats.headers_detected, 1);
        assert_eq!(worker.stats.schema_changes, 0);
    }

    #[test]
    fn test_full_event_queue_counts_drops() {
        let (worker, _h) = create_test_worker(
            scripted(&["A,B", "x,1", "x,2", "x,3", "x,4"]),
            Duration::ZERO,
            1,
        );
        let stats = worker.run();
        assert_eq!(stats.rows_rejected, 4);
        assert!(stats.dropped_events > 0);
    }
}
