//! # csvscope: Serial CSV Oscilloscope
//!
//! A real-time plotter for microcontrollers that print comma-separated values
//! over a serial port. The column layout is not configured up front: the first
//! line containing a non-numeric name is taken as the header, and every later
//! line is parsed against it.
//!
//! ## Architecture
//!
//! - **Backend**: Reads lines in a separate thread, detects the header and
//!   fills a bounded per-column store
//! - **Frontend**: Renders the UI using eframe/egui with egui_plot for graphs
//! - **Communication**: Crossbeam channels for commands and events, a shared
//!   `RwLock` store for samples
//!
//! ## Configuration
//!
//! Configuration and last-session state are stored in the platform-appropriate
//! data directory under `dev.csvscope`:
//!
//! - **Linux**: `~/.local/share/dev.csvscope/`
//! - **macOS**: `~/Library/Application Support/dev.csvscope/`
//! - **Windows**: `%APPDATA%\dev.csvscope\`
//!
//! ## Example
//!
//! ```ignore
//! use csvscope::{AppConfig, ScopeEngine};
//!
//! let mut engine = ScopeEngine::new(AppConfig::load_or_create());
//! engine.connect("/dev/ttyACM0")?;
//!
//! loop {
//!     engine.poll();
//!     if let Some(samples) = engine.store().snapshot("AccX") {
//!         println!("{} samples", samples.len());
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod frontend;
pub mod types;

// Re-export commonly used types
pub use backend::{EngineEvent, ScopeEngine, SignalStore};
pub use config::{AppConfig, AppState, ScaleMode, ViewSettings};
pub use error::{Result, RowError, ScopeError};
pub use frontend::ScopeApp;
pub use types::{ConnectionStatus, IngestStats, Sample, Schema, SessionState};
