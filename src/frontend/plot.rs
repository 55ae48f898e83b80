//! Plot rendering with egui_plot
//!
//! Draws the selected signal over a sliding window of row indices. The X
//! window always spans `capacity` samples; the Y range comes from the
//! selected [`ScaleMode`].

use egui::{Color32, Ui};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};

use crate::config::{x_window, ScaleMode, UiConfig};
use crate::types::Sample;

const LINE_COLOR: Color32 = Color32::from_rgb(80, 170, 255);

/// Plot configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ScopePlot {
    pub line_width: f32,
    pub show_grid: bool,
}

impl Default for ScopePlot {
    fn default() -> Self {
        Self {
            line_width: 2.0,
            show_grid: true,
        }
    }
}

impl ScopePlot {
    pub fn from_config(config: &UiConfig) -> Self {
        Self {
            line_width: config.line_width,
            show_grid: config.show_grid,
        }
    }

    /// Render one signal. An empty slice still draws the axes.
    pub fn render(
        &self,
        ui: &mut Ui,
        name: &str,
        samples: &[Sample],
        scale_mode: ScaleMode,
        capacity: usize,
    ) {
        let (min, max) = plot_bounds(samples, scale_mode, capacity);

        let plot = Plot::new("signal_plot")
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .show_axes(true)
            .show_grid(self.show_grid)
            .x_axis_label("Sample")
            .y_axis_label(name.to_string());

        plot.show(ui, |plot_ui| {
            plot_ui.set_plot_bounds(PlotBounds::from_min_max(min, max));

            if samples.is_empty() {
                return;
            }
            let points: PlotPoints = samples
                .iter()
                .map(Sample::as_point)
                .collect::<Vec<_>>()
                .into();
            let line = Line::new(name.to_string(), points)
                .color(LINE_COLOR)
                .width(self.line_width);
            plot_ui.line(line);
        });
    }
}

/// Plot bounds `([x_min, y_min], [x_max, y_max])` for a signal window
pub fn plot_bounds(
    samples: &[Sample],
    scale_mode: ScaleMode,
    capacity: usize,
) -> ([f64; 2], [f64; 2]) {
    let latest = samples.last().map_or(0, |s| s.index);
    let (x_min, x_max) = x_window(latest, capacity);
    let (y_min, y_max) = scale_mode.y_bounds(samples.iter().map(|s| s.value));
    ([x_min, y_min], [x_max, y_max])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn samples(range: std::ops::Range<u64>) -> Vec<Sample> {
        range
            .map(|i| Sample::new(i, Duration::ZERO, i as f64))
            .collect()
    }

    #[test]
    fn test_bounds_follow_latest_sample() {
        let data = samples(600..1000);
        let (min, max) = plot_bounds(&data, ScaleMode::Fixed(5.0), 500);
        assert_eq!(min, [500.0, -5.0]);
        assert_eq!(max, [1000.0, 5.0]);
    }

    #[test]
    fn test_bounds_for_empty_signal() {
        let (min, max) = plot_bounds(&[], ScaleMode::Auto, 100);
        assert_eq!(min, [0.0, -1.0]);
        assert_eq!(max, [100.0, 1.0]);
    }

    #[test]
    fn test_auto_bounds_cover_data() {
        let data = samples(0..11);
        let (min, max) = plot_bounds(&data, ScaleMode::Auto, 100);
        assert!(min[1] < 0.0 && max[1] > 10.0);
    }

    #[test]
    fn test_plot_from_config() {
        let config = UiConfig {
            line_width: 3.5,
            show_grid: false,
            ..UiConfig::default()
        };
        let plot = ScopePlot::from_config(&config);
        assert_eq!(plot.line_width, 3.5);
        assert!(!plot.show_grid);
    }
}
