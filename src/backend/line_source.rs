//! Line sources: byte-stream connections that yield text lines
//!
//! All sources implement [`LineSource`]. A read returns within the configured
//! timeout even when the device is silent ([`ReadOutcome::Idle`]), which lets
//! the ingestion worker notice a disconnect request promptly.
//!
//! - [`ReaderLineSource`] wraps any [`Read`] (serial ports, files, pipes)
//! - [`ScriptedLineSource`] replays a fixed list of lines
//! - `SimulatedLineSource` (feature `mock-source`) fakes a sensor board

use crate::config::SerialConfig;
use crate::error::{Result, ScopeError};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::Duration;

/// Address prefix selecting the simulated device
pub const SIMULATED_ADDRESS_PREFIX: &str = "sim://";

/// Result of a single read attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete, trimmed, non-empty line
    Line(String),
    /// No complete line arrived before the read timeout
    Idle,
    /// A line exceeded the length limit and was discarded
    Overflow(usize),
}

/// A byte-stream connection read line by line.
///
/// Owned exclusively by the ingestion worker.
#[cfg_attr(test, mockall::automock)]
pub trait LineSource: Send {
    /// Read the next line, blocking for at most the source's read timeout.
    ///
    /// Fails with [`ScopeError::Disconnected`] once the transport is gone.
    fn read_line(&mut self) -> Result<ReadOutcome>;

    /// Release the transport. Calling it again has no effect.
    fn close(&mut self);

    /// Endpoint description for logs and status text
    fn describe(&self) -> String;
}

/// Splits a byte stream into trimmed lines.
///
/// Invalid UTF-8 is replaced, empty lines are skipped, and a line longer than
/// `max_line_len` is dropped up to its terminator.
#[derive(Debug)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    max_line_len: usize,
    /// Bytes discarded from the line currently being skipped
    skipping: Option<usize>,
}

impl LineAssembler {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(256),
            max_line_len: max_line_len.max(1),
            skipping: None,
        }
    }

    /// Feed bytes, pushing every completed line onto `out`
    pub fn push(&mut self, bytes: &[u8], out: &mut VecDeque<ReadOutcome>) {
        for &byte in bytes {
            if byte == b'\n' {
                if let Some(len) = self.skipping.take() {
                    out.push_back(ReadOutcome::Overflow(len));
                } else {
                    self.emit(out);
                }
                continue;
            }

            if let Some(len) = self.skipping.as_mut() {
                *len += 1;
                continue;
            }

            self.buffer.push(byte);
            if self.buffer.len() > self.max_line_len {
                self.skipping = Some(self.buffer.len());
                self.buffer.clear();
            }
        }
    }

    /// Emit whatever is buffered as a final line (end of stream)
    pub fn flush(&mut self, out: &mut VecDeque<ReadOutcome>) {
        if let Some(len) = self.skipping.take() {
            out.push_back(ReadOutcome::Overflow(len));
        } else {
            self.emit(out);
        }
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.skipping = None;
    }

    fn emit(&mut self, out: &mut VecDeque<ReadOutcome>) {
        let text = String::from_utf8_lossy(&self.buffer);
        let line = text.trim();
        if !line.is_empty() {
            out.push_back(ReadOutcome::Line(line.to_string()));
        }
        self.buffer.clear();
    }
}

/// Line source over any blocking reader.
///
/// Serial ports report silence as a timeout; plain readers report end of
/// stream with `Ok(0)`. `eof_disconnects` selects how `Ok(0)` is treated.
pub struct ReaderLineSource<R> {
    reader: Option<R>,
    name: String,
    assembler: LineAssembler,
    pending: VecDeque<ReadOutcome>,
    eof_disconnects: bool,
    chunk: Vec<u8>,
}

/// Serial port line source
pub type SerialLineSource = ReaderLineSource<Box<dyn tokio_serial::SerialPort>>;

impl<R: Read + Send> ReaderLineSource<R> {
    /// Wrap a reader; `Ok(0)` from it means the stream ended
    pub fn new(reader: R, name: impl Into<String>, max_line_len: usize) -> Self {
        Self {
            reader: Some(reader),
            name: name.into(),
            assembler: LineAssembler::new(max_line_len),
            pending: VecDeque::new(),
            eof_disconnects: true,
            chunk: vec![0u8; 1024],
        }
    }

    /// Treat `Ok(0)` as "no data yet" instead of end of stream
    pub fn with_eof_as_idle(mut self) -> Self {
        self.eof_disconnects = false;
        self
    }
}

impl SerialLineSource {
    /// Open a serial port at the configured baud rate and read timeout
    pub fn open(path: &str, config: &SerialConfig) -> Result<Self> {
        let port = tokio_serial::new(path, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|e| ScopeError::Connection(format!("Failed to open {}: {}", path, e)))?;

        tracing::info!("Opened serial port {} at {} baud", path, config.baud_rate);
        Ok(ReaderLineSource::new(port, path, config.max_line_len).with_eof_as_idle())
    }
}

impl<R: Read + Send> LineSource for ReaderLineSource<R> {
    fn read_line(&mut self) -> Result<ReadOutcome> {
        if let Some(outcome) = self.pending.pop_front() {
            return Ok(outcome);
        }

        let Some(reader) = self.reader.as_mut() else {
            return Err(ScopeError::Disconnected(format!("{} is closed", self.name)));
        };

        match reader.read(&mut self.chunk) {
            Ok(0) if self.eof_disconnects => {
                self.assembler.flush(&mut self.pending);
                self.reader = None;
                match self.pending.pop_front() {
                    Some(outcome) => Ok(outcome),
                    None => Err(ScopeError::Disconnected(format!(
                        "{}: end of stream",
                        self.name
                    ))),
                }
            }
            Ok(0) => Ok(ReadOutcome::Idle),
            Ok(n) => {
                self.assembler.push(&self.chunk[..n], &mut self.pending);
                Ok(self.pending.pop_front().unwrap_or(ReadOutcome::Idle))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(ReadOutcome::Idle)
            }
            Err(e) => {
                self.reader = None;
                self.assembler.reset();
                Err(ScopeError::Disconnected(format!("{}: {}", self.name, e)))
            }
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!("Closed {}", self.name);
        }
        self.pending.clear();
        self.assembler.reset();
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// What a [`ScriptedLineSource`] does after its last line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptEnd {
    /// Report the transport as dropped
    #[default]
    Disconnect,
    /// Keep reporting idle reads until closed
    Idle,
}

/// Replays a fixed list of lines, for tests and demos
#[derive(Debug, Clone)]
pub struct ScriptedLineSource {
    lines: VecDeque<String>,
    end: ScriptEnd,
    line_delay: Duration,
    idle_delay: Duration,
    closed: bool,
}

impl ScriptedLineSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            end: ScriptEnd::Disconnect,
            line_delay: Duration::ZERO,
            idle_delay: Duration::from_millis(5),
            closed: false,
        }
    }

    /// Choose what happens once the script runs out
    pub fn with_end(mut self, end: ScriptEnd) -> Self {
        self.end = end;
        self
    }

    /// Pause before each line, like a device sending at a fixed rate
    pub fn with_line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }

    /// Lines not yet delivered
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for ScriptedLineSource {
    fn read_line(&mut self) -> Result<ReadOutcome> {
        if self.closed {
            return Err(ScopeError::Disconnected("script closed".into()));
        }

        while let Some(line) = self.lines.pop_front() {
            if !self.line_delay.is_zero() {
                std::thread::sleep(self.line_delay);
            }
            let line = line.trim();
            if !line.is_empty() {
                return Ok(ReadOutcome::Line(line.to_string()));
            }
        }

        match self.end {
            ScriptEnd::Disconnect => Err(ScopeError::Disconnected("script exhausted".into())),
            ScriptEnd::Idle => {
                std::thread::sleep(self.idle_delay);
                Ok(ReadOutcome::Idle)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.lines.clear();
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

/// Open the line source named by `address`.
///
/// `sim://...` selects the simulated device (feature `mock-source`); anything
/// else is a serial device path.
pub fn open_line_source(address: &str, config: &SerialConfig) -> Result<Box<dyn LineSource>> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ScopeError::Connection("No port given".into()));
    }

    if let Some(options) = address.strip_prefix(SIMULATED_ADDRESS_PREFIX) {
        #[cfg(feature = "mock-source")]
        {
            return Ok(Box::new(crate::backend::mock_source::SimulatedLineSource::from_options(
                options,
            )?));
        }
        #[cfg(not(feature = "mock-source"))]
        {
            let _ = options;
            return Err(ScopeError::Connection(
                "Simulated device requires the mock-source feature".into(),
            ));
        }
    }

    Ok(Box::new(SerialLineSource::open(address, config)?))
}

/// Names of the serial ports present on this machine
pub fn available_ports() -> Vec<String> {
    match tokio_serial::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}
