//! Core data types for csvscope
//!
//! This module contains the data structures shared between the ingestion
//! backend and the viewer.
//!
//! # Main Types
//!
//! - [`Schema`] - Ordered, unique column names detected from a header line
//! - [`Sample`] - A single value with the row index and capture time it belongs to
//! - [`SessionState`] - Whether the engine is waiting for a header or streaming rows
//! - [`ConnectionStatus`] - UI-facing transport status
//! - [`IngestStats`] - Counters published by the ingestion loop
//! - [`IncrementalStats`] - O(1) running min/max/mean for a signal window

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of samples retained per signal
pub const DEFAULT_CAPACITY: usize = 500;

/// Column names of the active session, in wire order.
///
/// Names are unique: empty header tokens become `column_<n>` and repeated
/// names get a `_<k>` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Build a schema from column names, naming empties and removing duplicates
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for (i, name) in columns.into_iter().enumerate() {
            let name = name.into();
            let name = name.trim();
            let base = if name.is_empty() {
                format!("column_{}", i + 1)
            } else {
                name.to_string()
            };

            let mut candidate = base.clone();
            let mut k = 2;
            while unique.contains(&candidate) {
                candidate = format!("{}_{}", base, k);
                k += 1;
            }
            unique.push(candidate);
        }
        Self { columns: unique }
    }

    /// Build a schema from a raw header line (comma-separated, whitespace trimmed)
    pub fn from_header(line: &str) -> Self {
        Self::new(line.split(','))
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// True when the shorter schema is a proper prefix or suffix of the longer one.
    ///
    /// Used to recognise a device that reprints its header with columns added
    /// or removed at either end.
    pub fn overlaps_at_edge(&self, other: &Schema) -> bool {
        let (short, long) = if self.arity() < other.arity() {
            (self.columns(), other.columns())
        } else if other.arity() < self.arity() {
            (other.columns(), self.columns())
        } else {
            return false;
        };

        if short.is_empty() {
            return false;
        }
        long.starts_with(short) || long.ends_with(short)
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.columns.join(", "))
    }
}

/// A single sample of one signal.
///
/// Every column of the same row carries the same `index` and `elapsed`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Row sequence number within the session, starting at 0
    pub index: u64,
    /// Capture time relative to the start of the session
    pub elapsed: Duration,
    /// The numeric value
    pub value: f64,
}

impl Sample {
    pub fn new(index: u64, elapsed: Duration, value: f64) -> Self {
        Self {
            index,
            elapsed,
            value,
        }
    }

    /// Plot point with the row index on the X axis
    pub fn as_point(&self) -> [f64; 2] {
        [self.index as f64, self.value]
    }
}

/// Header detection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No schema yet; lines are checked for a header
    #[default]
    AwaitingHeader,
    /// A schema is active; lines are parsed as rows
    Streaming,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::AwaitingHeader => write!(f, "Awaiting header"),
            SessionState::Streaming => write!(f, "Streaming"),
        }
    }
}

/// Represents the connection status to the serial device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Not connected
    #[default]
    Disconnected,
    /// Port open, waiting for the device to settle
    Connecting,
    /// Reading lines
    Connected,
    /// The transport dropped during a session
    Lost,
    /// The last connection attempt failed
    Error,
}

impl ConnectionStatus {
    /// Whether an ingestion worker is (or should be) running
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting | ConnectionStatus::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Lost => write!(f, "Connection lost"),
            ConnectionStatus::Error => write!(f, "Error"),
        }
    }
}

/// Counters published by the ingestion loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    /// Non-empty lines delivered by the line source
    pub lines_read: u64,
    /// Rows appended to the signal store
    pub rows_accepted: u64,
    /// Rows dropped by the row parser
    pub rows_rejected: u64,
    /// Lines discarded before a header, or matching a noise word
    pub noise_lines: u64,
    /// Headers that established a schema
    pub headers_detected: u64,
    /// Headers re-detected while streaming
    pub schema_changes: u64,
    /// Events dropped because the UI queue was full
    pub dropped_events: u64,
    /// Accepted rows per second since the last stats update
    pub effective_row_rate: f64,
}

impl IngestStats {
    /// Rejected rows as a percentage of parsed rows
    pub fn rejection_rate(&self) -> f64 {
        let total = self.rows_accepted + self.rows_rejected;
        if total == 0 {
            0.0
        } else {
            (self.rows_rejected as f64 / total as f64) * 100.0
        }
    }
}

/// Incremental statistics tracker
/// This allows O(1) updates for mean, min, and max without iterating all data
#[derive(Debug, Clone)]
pub struct IncrementalStats {
    /// Current count of values
    pub count: u64,
    /// Running sum for average calculation
    pub sum: f64,
    /// Current minimum value
    pub min: f64,
    /// Current maximum value
    pub max: f64,
}

impl Default for IncrementalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalStats {
    /// Create a new empty stats tracker
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Add a new value to the statistics
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Remove an evicted value. Callers recalculate min/max if it was an extreme.
    #[inline]
    pub fn pop(&mut self, value: f64) {
        if self.count > 0 {
            self.count -= 1;
            self.sum -= value;
        }
    }

    /// Get the current average
    #[inline]
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Get statistics as (min, max, avg) tuple
    #[inline]
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        if self.count == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (self.min, self.max, self.average())
        }
    }

    /// Reset the statistics
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Recompute exact min/max from the retained samples
    pub fn recalculate_minmax(&mut self, samples: &VecDeque<Sample>) {
        self.min = f64::MAX;
        self.max = f64::MIN;
        for s in samples {
            self.min = self.min.min(s.value);
            self.max = self.max.max(s.value);
        }
    }
}
