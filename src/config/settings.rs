//! Read-side view settings
//!
//! These settings only affect how the viewer draws the signal store; they
//! never influence ingestion.
//!
//! # Main Types
//!
//! - [`ViewSettings`] - Selected signal and Y-scale mode
//! - [`ScaleMode`] - Auto-fit or a fixed symmetric range
//!
//! # Axis Control
//!
//! - **Y axis**: [`ScaleMode::y_bounds`] fits the visible values with a 10%
//!   margin, or uses a fixed `±N` range
//! - **X axis**: [`x_window`] keeps a window of `capacity` samples that
//!   slides with the newest row index

use crate::types::Schema;
use serde::{Deserialize, Serialize};

/// Fixed ranges offered in the Y-scale selector
pub const SCALE_PRESETS: [f64; 6] = [1.0, 5.0, 10.0, 20.0, 50.0, 100.0];

/// Fraction of the data range added above and below in auto mode
const AUTO_MARGIN: f64 = 0.1;

/// Y-axis scaling mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ScaleMode {
    /// Fit the visible data
    #[default]
    Auto,
    /// Symmetric fixed range `[-limit, +limit]`
    Fixed(f64),
}

impl ScaleMode {
    /// Every mode offered in the selector, auto first
    pub fn all() -> Vec<ScaleMode> {
        std::iter::once(ScaleMode::Auto)
            .chain(SCALE_PRESETS.iter().map(|&v| ScaleMode::Fixed(v)))
            .collect()
    }

    /// Get display name for this mode
    pub fn display_name(&self) -> String {
        match self {
            ScaleMode::Auto => "Auto".to_string(),
            ScaleMode::Fixed(limit) => format!("±{}", limit),
        }
    }

    /// Y bounds for the given values.
    ///
    /// Auto mode pads the min/max range by 10%; a flat signal is widened to a
    /// range of 1 so it stays visible. With no values, auto mode shows `±1`.
    pub fn y_bounds(&self, values: impl IntoIterator<Item = f64>) -> (f64, f64) {
        match *self {
            ScaleMode::Fixed(limit) => {
                let limit = limit.abs().max(f64::MIN_POSITIVE);
                (-limit, limit)
            }
            ScaleMode::Auto => {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                for v in values.into_iter().filter(|v| v.is_finite()) {
                    min = min.min(v);
                    max = max.max(v);
                }
                if min > max {
                    return (-1.0, 1.0);
                }
                let mut range = max - min;
                if range == 0.0 {
                    range = 1.0;
                }
                let margin = range * AUTO_MARGIN;
                (min - margin, max + margin)
            }
        }
    }
}

impl std::fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// X range (in row indices) showing `capacity` samples up to `latest_index`
pub fn x_window(latest_index: u64, capacity: usize) -> (f64, f64) {
    let capacity = capacity as f64;
    let x_min = (latest_index as f64 - capacity + 1.0).max(0.0);
    (x_min, x_min + capacity)
}

/// What the viewer is currently showing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    /// Column drawn in the plot
    pub selected_signal: Option<String>,
    /// Y-axis scaling
    pub scale_mode: ScaleMode,
}

impl ViewSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a signal by name. Returns false (and keeps the old selection)
    /// if the schema has no such column.
    pub fn select_signal(&mut self, schema: &Schema, name: &str) -> bool {
        if schema.contains(name) {
            self.selected_signal = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn select_scale_mode(&mut self, mode: ScaleMode) {
        self.scale_mode = mode;
    }

    /// Keep the selection valid after a schema change: keep it if the column
    /// still exists, otherwise fall back to the first column.
    pub fn on_schema_changed(&mut self, schema: &Schema) {
        let still_valid = self
            .selected_signal
            .as_deref()
            .is_some_and(|name| schema.contains(name));
        if !still_valid {
            self.selected_signal = schema.columns().first().cloned();
        }
    }
}
