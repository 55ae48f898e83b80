//! Serial CSV Oscilloscope - Main Entry Point
//!
//! Plots comma-separated values printed by a microcontroller over a serial
//! port, detecting the column names at runtime.

use anyhow::Context;
use csvscope::{
    config::{self, AppConfig, AppState},
    frontend::ScopeApp,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stdout and rolling-file loggers.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging() -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,csvscope=debug"));

    let file_writer = match config::log_dir() {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            Some(tracing_appender::non_blocking(
                tracing_appender::rolling::daily(dir, "csvscope.log"),
            ))
        }
        None => None,
    };

    let (file_layer, guard) = match file_writer {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to install logger")?;

    Ok(guard)
}

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging()?;

    tracing::info!("Starting Serial CSV Oscilloscope");

    let config = AppConfig::load_or_create();
    let app_state = AppState::load_or_default();

    // Configure eframe options
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 600.0])
            .with_min_inner_size([640.0, 400.0])
            .with_title("Serial CSV Oscilloscope"),
        ..Default::default()
    };

    // Run the eframe application; state is saved in `on_exit`
    eframe::run_native(
        "Serial CSV Oscilloscope",
        native_options,
        Box::new(|cc| Ok(Box::new(ScopeApp::new(cc, config, app_state)))),
    )
    .map_err(|e| anyhow::anyhow!("UI failed: {}", e))?;

    tracing::info!("Shutting down...");
    Ok(())
}
