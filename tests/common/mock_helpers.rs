//! Mock construction helpers

use csvscope::backend::{ReaderLineSource, ScopeEngine};
use std::io::{self, Read};
use std::time::{Duration, Instant};

use super::test_timeout;

/// Poll the engine until `done` holds. Returns false on timeout.
pub fn wait_for(engine: &mut ScopeEngine, mut done: impl FnMut(&ScopeEngine) -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    loop {
        engine.poll();
        if done(engine) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A reader that never delivers data, like a silent serial port.
///
/// Every read blocks for `timeout` and then reports `TimedOut`.
pub struct SilentPort {
    timeout: Duration,
}

impl SilentPort {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Wrapped as a line source
    pub fn into_source(self) -> ReaderLineSource<SilentPort> {
        ReaderLineSource::new(self, "silent port", 1024)
    }
}

impl Read for SilentPort {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        std::thread::sleep(self.timeout);
        Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
    }
}
