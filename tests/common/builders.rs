//! Test data builders for creating test objects

use csvscope::backend::{ScriptEnd, ScriptedLineSource};
use csvscope::config::AppConfig;
use std::time::Duration;

/// Configuration suited to tests: no settle delay, fast stats
pub fn test_config(capacity: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.ingest.capacity = capacity;
    config.ingest.stats_interval_ms = 10;
    config.serial.settle_delay_ms = 0;
    config
}

/// Builder for scripted device output
pub struct ScriptBuilder {
    lines: Vec<String>,
    end: ScriptEnd,
    line_delay: Duration,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            end: ScriptEnd::Disconnect,
            line_delay: Duration::ZERO,
        }
    }

    /// Append one raw line
    pub fn line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// Append a header from column names
    pub fn header(self, columns: &[&str]) -> Self {
        let header = columns.join(",");
        self.line(&header)
    }

    /// Append `count` rows of `arity` columns; row `i` holds `i` in every column
    pub fn rows(mut self, count: usize, arity: usize) -> Self {
        for i in 0..count {
            let row = vec![i.to_string(); arity].join(",");
            self.lines.push(row);
        }
        self
    }

    /// Keep the connection open (idle) after the last line
    pub fn idle_at_end(mut self) -> Self {
        self.end = ScriptEnd::Idle;
        self
    }

    pub fn line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }

    pub fn build(self) -> ScriptedLineSource {
        ScriptedLineSource::new(self.lines)
            .with_end(self.end)
            .with_line_delay(self.line_delay)
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_builder() {
        let source = ScriptBuilder::new()
            .line("boot")
            .header(&["A", "B"])
            .rows(3, 2)
            .build();
        assert_eq!(source.remaining(), 5);
    }
}
