//! Header detection state machine
//!
//! The detector decides, line by line, whether the session is still waiting
//! for the device to print its column names or is already streaming rows.
//!
//! # Header rule
//!
//! A line is a *header candidate* when at least one comma-separated token
//! contains a letter and does not coerce to a number. `AccX,AccY` and `t,1`
//! are candidates; `1e5,2` is not.
//!
//! While streaming, a line that fails to parse as a row is only taken as a
//! new header when every token is a name and the new column set either has
//! the current arity or overlaps the current schema at one edge (columns
//! added or removed at the start or end). Anything else is a malformed row.
//!
//! The rule is a heuristic: a column named only with digits is never
//! detected, and a data row carrying a textual error code (`1,ERR,3`) is
//! counted as malformed rather than treated as a header.

use crate::backend::row_parser::{parse_number, parse_row};
use crate::error::RowError;
use crate::types::{Schema, SessionState};

/// Outcome of classifying one line
#[derive(Debug, Clone, PartialEq)]
pub enum LineClass {
    /// Discarded: pre-header chatter or a line matching a noise word
    Noise,
    /// First header of the session; the detector is now streaming
    SchemaDetected(Schema),
    /// A new header arrived while streaming; buffers must be reset
    SchemaChanged(Schema),
    /// A complete, valid row with one value per column
    Row(Vec<f64>),
    /// A data line that failed field-count or numeric checks
    Malformed(RowError),
}

/// Lines the detector has consumed without producing a row.
///
/// Counters cover one session and are zeroed by [`HeaderDetector::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorCounters {
    pub headers_detected: u64,
    pub schema_changes: u64,
    pub noise_lines: u64,
}

/// Two-state classifier owning the session schema
#[derive(Debug, Clone)]
pub struct HeaderDetector {
    state: SessionState,
    schema: Schema,
    counters: DetectorCounters,
    /// Lowercased words that mark a line as device chatter
    noise_words: Vec<String>,
}

impl Default for HeaderDetector {
    fn default() -> Self {
        Self::new(&[] as &[String])
    }
}

impl HeaderDetector {
    /// Create a detector in `AwaitingHeader`
    pub fn new<S: AsRef<str>>(noise_words: &[S]) -> Self {
        Self {
            state: SessionState::AwaitingHeader,
            schema: Schema::default(),
            counters: DetectorCounters::default(),
            noise_words: noise_words
                .iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The active schema (empty while awaiting a header)
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn counters(&self) -> DetectorCounters {
        self.counters
    }

    /// Forget the schema and counters and wait for a new header
    pub fn reset(&mut self) {
        self.state = SessionState::AwaitingHeader;
        self.schema = Schema::default();
        self.counters = DetectorCounters::default();
    }

    /// Classify a line that was cut off at `len` bytes.
    ///
    /// Before a header there are no rows to reject, so it is noise.
    pub fn classify_overflow(&mut self, len: usize) -> LineClass {
        match self.state {
            SessionState::AwaitingHeader => {
                self.counters.noise_lines += 1;
                LineClass::Noise
            }
            SessionState::Streaming => LineClass::Malformed(RowError::TooLong { len }),
        }
    }

    /// Classify one trimmed, non-empty line and advance the state machine
    pub fn classify(&mut self, line: &str) -> LineClass {
        let line = line.trim();
        if line.is_empty() || self.is_noise(line) {
            self.counters.noise_lines += 1;
            return LineClass::Noise;
        }

        match self.state {
            SessionState::AwaitingHeader => {
                if is_header_candidate(line) {
                    let schema = Schema::from_header(line);
                    self.schema = schema.clone();
                    self.state = SessionState::Streaming;
                    self.counters.headers_detected += 1;
                    LineClass::SchemaDetected(schema)
                } else {
                    self.counters.noise_lines += 1;
                    LineClass::Noise
                }
            }
            SessionState::Streaming => match parse_row(line, self.schema.arity()) {
                Ok(values) => LineClass::Row(values),
                Err(err) => {
                    if self.is_new_header(line) {
                        let schema = Schema::from_header(line);
                        self.schema = schema.clone();
                        self.counters.headers_detected += 1;
                        self.counters.schema_changes += 1;
                        LineClass::SchemaChanged(schema)
                    } else {
                        LineClass::Malformed(err)
                    }
                }
            },
        }
    }

    fn is_noise(&self, line: &str) -> bool {
        if self.noise_words.is_empty() {
            return false;
        }
        let lower = line.to_lowercase();
        self.noise_words.iter().any(|w| lower.contains(w.as_str()))
    }

    fn is_new_header(&self, line: &str) -> bool {
        if !is_header_candidate(line) || !is_name_line(line) {
            return false;
        }
        let candidate = Schema::from_header(line);
        candidate.arity() == self.schema.arity() || candidate.overlaps_at_edge(&self.schema)
    }
}

/// True if at least one token contains a letter and is not a number
pub fn is_header_candidate(line: &str) -> bool {
    line.split(',').any(|token| {
        let token = token.trim();
        token.chars().any(char::is_alphabetic) && parse_number(token).is_none()
    })
}

/// True if no token of the line is numeric
fn is_name_line(line: &str) -> bool {
    line.split(',').all(|token| parse_number(token).is_none())
}
