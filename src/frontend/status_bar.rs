//! Status row: detection state, data point count and rejected rows.

use egui::{Color32, RichText, Ui};

use crate::backend::ColumnStats;
use crate::frontend::toolbar::status_color;
use crate::types::{ConnectionStatus, IngestStats};

/// Context needed to render the status bar.
pub struct StatusBarContext<'a> {
    pub status: ConnectionStatus,
    pub address: Option<&'a str>,
    pub detection: &'a str,
    pub total_rows: u64,
    pub stats: &'a IngestStats,
    pub connected_since: Option<String>,
    pub last_error: Option<&'a str>,
    /// Plotted signal and its window statistics
    pub signal_stats: Option<(&'a str, ColumnStats)>,
}

/// Render the status bar.
pub fn render_status_bar(ui: &mut Ui, ctx: &StatusBarContext<'_>) {
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        // === Connection status dot + port ===
        ui.colored_label(status_color(ctx.status), "●");
        let status_text = match ctx.address {
            Some(address) if ctx.status != ConnectionStatus::Disconnected => {
                format!("{}: {}", ctx.status, address)
            }
            _ => ctx.status.to_string(),
        };
        ui.label(RichText::new(status_text).small());
        if let Some(since) = &ctx.connected_since {
            ui.label(RichText::new(format!("since {}", since)).small().weak());
        }

        ui.separator();

        ui.label(RichText::new(ctx.detection).small());

        ui.separator();

        let points = ui.label(RichText::new(format!("Data points: {}", ctx.total_rows)).small());
        if let Some((name, stats)) = &ctx.signal_stats {
            points.on_hover_text(stats_summary(name, stats));
        }

        ui.separator();

        let rate = ctx.stats.effective_row_rate;
        let rate_color = if rate > 0.0 {
            Color32::from_rgb(100, 255, 100)
        } else {
            Color32::GRAY
        };
        ui.colored_label(rate_color, RichText::new(format!("{:.1} rows/s", rate)).small());

        ui.separator();

        let rejected = ctx.stats.rows_rejected;
        let rejected_color = if rejected > 0 {
            Color32::LIGHT_RED
        } else {
            Color32::GRAY
        };
        ui.colored_label(
            rejected_color,
            RichText::new(format!(
                "Rejected: {} ({:.1}%)",
                rejected,
                ctx.stats.rejection_rate()
            ))
            .small(),
        )
        .on_hover_text(format!(
            "Lines read: {}\nNoise lines: {}\nHeaders: {}\nDropped events: {}",
            ctx.stats.lines_read,
            ctx.stats.noise_lines,
            ctx.stats.headers_detected,
            ctx.stats.dropped_events
        ));

        // === Error message (right-aligned) ===
        if let Some(error) = ctx.last_error {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.colored_label(Color32::RED, RichText::new(error).small());
            });
        }
    });
}

/// Hover text for the plotted signal's window
fn stats_summary(name: &str, stats: &ColumnStats) -> String {
    format!(
        "{} over last {} samples\nMin: {:.3}\nMax: {:.3}\nMean: {:.3}",
        name, stats.count, stats.min, stats.max, stats.mean
    )
}
