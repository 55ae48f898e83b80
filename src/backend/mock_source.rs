//! Simulated serial device for running without hardware
//!
//! The simulated board behaves like a typical Arduino sketch: it prints a few
//! boot messages, then a CSV header, then one row per tick. Every
//! `glitch_every` rows it prints a garbled line so the malformed-row path can
//! be watched in the viewer.
//!
//! # Address
//!
//! `sim://` selects the default board; options follow as `key=value` pairs
//! separated by `&`:
//!
//! - `rate=<hz>` - rows per second (default 100)
//! - `glitch=<n>` - garbled line every n rows, 0 disables (default 250)
//! - `columns=<n>` - number of signal columns, 1 to 8 (default 4)
//!
//! ```bash
//! cargo run --features mock-source
//! # then connect to sim://rate=200&glitch=0
//! ```

use crate::backend::line_source::{LineSource, ReadOutcome};
use crate::error::{Result, ScopeError};
use std::time::{Duration, Instant};

const COLUMN_NAMES: [&str; 8] = [
    "AccX", "AccY", "AccZ", "Temp", "GyroX", "GyroY", "GyroZ", "Counter",
];

/// Pattern for generating simulated data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimPattern {
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments and wraps
    Counter { step: f64, min: f64, max: f64 },
    /// Square wave
    Square { period: f64, amplitude: f64 },
    /// Triangle wave
    Triangle { period: f64, amplitude: f64 },
}

impl SimPattern {
    fn for_column(index: usize) -> Self {
        match index {
            0 => SimPattern::Sine {
                frequency: 1.0,
                amplitude: 1.0,
                offset: 0.0,
            },
            1 => SimPattern::Sine {
                frequency: 0.5,
                amplitude: 2.0,
                offset: 0.5,
            },
            2 => SimPattern::Triangle {
                period: 4.0,
                amplitude: 9.81,
            },
            3 => SimPattern::Sine {
                frequency: 0.05,
                amplitude: 2.0,
                offset: 25.0,
            },
            4 | 5 => SimPattern::Square {
                period: 2.0 + index as f64,
                amplitude: 50.0,
            },
            6 => SimPattern::Sine {
                frequency: 2.0,
                amplitude: 20.0,
                offset: 0.0,
            },
            _ => SimPattern::Counter {
                step: 1.0,
                min: 0.0,
                max: 1000.0,
            },
        }
    }

    fn value(&self, t: f64, tick: u64) -> f64 {
        match *self {
            SimPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin(),
            SimPattern::Counter { step, min, max } => {
                let span = (max - min).max(step);
                min + (tick as f64 * step) % span
            }
            SimPattern::Square { period, amplitude } => {
                if t % period < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            SimPattern::Triangle { period, amplitude } => {
                let p = t % period;
                let half = period / 2.0;
                if p < half {
                    amplitude * (2.0 * p / half - 1.0)
                } else {
                    amplitude * (1.0 - 2.0 * (p - half) / half)
                }
            }
        }
    }
}

/// Fake sensor board producing CSV lines at a fixed rate
#[derive(Debug)]
pub struct SimulatedLineSource {
    patterns: Vec<SimPattern>,
    names: Vec<&'static str>,
    period: Duration,
    glitch_every: u64,
    boot: Vec<String>,
    header_sent: bool,
    tick: u64,
    started: Instant,
    next_due: Instant,
    closed: bool,
}

impl SimulatedLineSource {
    pub fn new(rate_hz: u32, columns: usize, glitch_every: u64) -> Self {
        let columns = columns.clamp(1, COLUMN_NAMES.len());
        let now = Instant::now();
        Self {
            patterns: (0..columns).map(SimPattern::for_column).collect(),
            names: COLUMN_NAMES[..columns].to_vec(),
            period: Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64),
            glitch_every,
            boot: vec![
                "Initializing sensors...".to_string(),
                "IMU init successful".to_string(),
            ],
            header_sent: false,
            tick: 0,
            started: now,
            next_due: now,
            closed: false,
        }
    }

    /// Build from the part of the address after `sim://`
    pub fn from_options(options: &str) -> Result<Self> {
        let mut rate = 100u32;
        let mut glitch = 250u64;
        let mut columns = 4usize;

        for pair in options.split('&').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| {
                    ScopeError::Connection(format!("Invalid simulator option '{}'", pair))
                })?;
            let invalid =
                |_| ScopeError::Connection(format!("Invalid value for '{}': {}", key, value));
            match key.trim() {
                "rate" => rate = value.trim().parse().map_err(invalid)?,
                "glitch" => glitch = value.trim().parse().map_err(invalid)?,
                "columns" => columns = value.trim().parse().map_err(invalid)?,
                other => {
                    return Err(ScopeError::Connection(format!(
                        "Unknown simulator option '{}'",
                        other
                    )))
                }
            }
        }

        tracing::info!(
            "Simulated device: {} columns at {} Hz, glitch every {} rows",
            columns,
            rate,
            glitch
        );
        Ok(Self::new(rate, columns, glitch))
    }

    fn next_row(&mut self) -> String {
        let tick = self.tick;
        self.tick += 1;

        if self.glitch_every > 0 && tick > 0 && tick % self.glitch_every == 0 {
            return format!("{},ERR,sensor timeout", tick);
        }

        let t = self.started.elapsed().as_secs_f64();
        self.patterns
            .iter()
            .map(|p| format!("{:.3}", p.value(t, tick)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl LineSource for SimulatedLineSource {
    fn read_line(&mut self) -> Result<ReadOutcome> {
        if self.closed {
            return Err(ScopeError::Disconnected("simulator closed".into()));
        }

        if !self.boot.is_empty() {
            return Ok(ReadOutcome::Line(self.boot.remove(0)));
        }
        if !self.header_sent {
            self.header_sent = true;
            return Ok(ReadOutcome::Line(self.names.join(",")));
        }

        let now = Instant::now();
        if now < self.next_due {
            std::thread::sleep(self.next_due - now);
        }
        self.next_due += self.period;
        Ok(ReadOutcome::Line(self.next_row()))
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn describe(&self) -> String {
        format!("simulator ({} columns)", self.names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::detector::{HeaderDetector, LineClass};

    #[test]
    fn test_simulator_emits_boot_header_rows() {
        let mut source = SimulatedLineSource::new(10_000, 3, 0);
        let mut detector = HeaderDetector::new(&["initializing", "successful"]);

        let mut classes = Vec::new();
        for _ in 0..6 {
            let ReadOutcome::Line(line) = source.read_line().unwrap() else {
                panic!("simulator should always produce lines");
            };
            classes.push(detector.classify(&line));
        }

        assert_eq!(classes[0], LineClass::Noise);
        assert_eq!(classes[1], LineClass::Noise);
        assert!(matches!(
            &classes[2],
            LineClass::SchemaDetected(s) if s.columns() == ["AccX", "AccY", "AccZ"]
        ));
        assert!(classes[3..].iter().all(|c| matches!(c, LineClass::Row(v) if v.len() == 3)));
    }

    #[test]
    fn test_simulator_glitches() {
        let mut source = SimulatedLineSource::new(10_000, 2, 2);
        source.boot.clear();
        source.header_sent = true;
        let lines: Vec<_> = (0..5).map(|_| source.read_line().unwrap()).collect();
        assert_eq!(lines[2], ReadOutcome::Line("2,ERR,sensor timeout".into()));
        assert_eq!(lines[4], ReadOutcome::Line("4,ERR,sensor timeout".into()));

        // A glitch never looks like a reprinted header
        let mut detector = HeaderDetector::default();
        detector.classify("AccX,AccY");
        let ReadOutcome::Line(glitch) = &lines[2] else { unreachable!() };
        assert!(matches!(detector.classify(glitch), LineClass::Malformed(_)));
    }

    #[test]
    fn test_from_options_parses_options() {
        let source = SimulatedLineSource::from_options("rate=50&columns=2&glitch=0").unwrap();
        assert_eq!(source.names, vec!["AccX", "AccY"]);
        assert_eq!(source.glitch_every, 0);
        assert_eq!(source.period.as_millis(), 20);

        assert!(SimulatedLineSource::from_options("rate=fast").is_err());
        assert!(SimulatedLineSource::from_options("color=red").is_err());
        assert!(SimulatedLineSource::from_options("").is_ok());
    }

    #[test]
    fn test_close_disconnects() {
        let mut source = SimulatedLineSource::new(100, 1, 0);
        source.close();
        assert!(source.read_line().unwrap_err().is_disconnect());
    }
}
