//! Configuration module for csvscope
//!
//! This module handles:
//! - Application configuration ([`AppConfig`], stored as TOML)
//! - Application state persistence ([`AppState`]: last port, recent ports, view)
//! - Read-side view settings ([`settings`])
//!
//! # App Data Location
//!
//! Files are stored in the platform-appropriate data directory under
//! `dev.csvscope`:
//!
//! - **Linux**: `~/.local/share/dev.csvscope/`
//! - **macOS**: `~/Library/Application Support/dev.csvscope/`
//! - **Windows**: `%APPDATA%\dev.csvscope\`
//!
//! # Files
//!
//! - `config.toml` - Serial, ingestion and UI configuration
//! - `app_state.json` - Last session info
//! - `logs/` - Daily rolling log files

pub mod settings;

pub use settings::*;

use crate::error::{Result, ResultExt, ScopeError};
use crate::types::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.csvscope";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Log directory name
pub const LOG_DIR: &str = "logs";

/// Maximum number of recent ports to remember
pub const MAX_RECENT_PORTS: usize = 10;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout; also the upper bound on disconnect latency
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Default wait after opening a port, for boards that reset on connect
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        ScopeError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            ScopeError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the config file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

/// Get the log directory
pub fn log_dir() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(LOG_DIR))
}

// ==================== App Config ====================

/// Serial transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate used for every port
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Wait after opening the port before reading
    pub settle_delay_ms: u64,
    /// Longest accepted line in bytes
    pub max_line_len: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            max_line_len: 4096,
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Samples kept per signal
    pub capacity: usize,
    /// Case-insensitive words marking a line as device chatter
    pub noise_words: Vec<String>,
    /// How often the worker publishes statistics
    pub stats_interval_ms: u64,
    /// Capacity of the worker to UI event queue
    pub event_queue_len: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            noise_words: vec![
                "initializing".to_string(),
                "successful".to_string(),
                "failed".to_string(),
            ],
            stats_interval_ms: 500,
            event_queue_len: 1024,
        }
    }
}

/// Viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Port shown in the port field on first launch
    pub default_port: String,
    /// Enable dark mode
    pub dark_mode: bool,
    /// Plot line width
    pub line_width: f32,
    /// Whether to show grid lines
    pub show_grid: bool,
    /// Repaint interval while connected
    pub repaint_interval_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_port: default_port_name().to_string(),
            dark_mode: true,
            line_width: 2.0,
            show_grid: true,
            repaint_interval_ms: 20,
        }
    }
}

fn default_port_name() -> &'static str {
    if cfg!(windows) {
        "COM3"
    } else if cfg!(target_os = "macos") {
        "/dev/cu.usbmodem1101"
    } else {
        "/dev/ttyACM0"
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub ingest: IngestConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.serial.baud_rate == 0 {
            return Err(ScopeError::Config("baud_rate must be positive".into()));
        }
        if !(1..=1000).contains(&self.serial.read_timeout_ms) {
            return Err(ScopeError::Config(format!(
                "read_timeout_ms must be between 1 and 1000, got {}",
                self.serial.read_timeout_ms
            )));
        }
        if self.serial.max_line_len == 0 {
            return Err(ScopeError::Config("max_line_len must be positive".into()));
        }
        if self.ingest.capacity < crate::backend::store::MIN_CAPACITY {
            return Err(ScopeError::Config(format!(
                "capacity must be at least {}, got {}",
                crate::backend::store::MIN_CAPACITY,
                self.ingest.capacity
            )));
        }
        if self.ingest.event_queue_len == 0 {
            return Err(ScopeError::Config("event_queue_len must be positive".into()));
        }
        Ok(())
    }

    /// Load and validate a TOML config file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ScopeError::Serialization(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, first writing the defaults there if it does not exist
    pub fn load_or_create_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from(path);
        }

        let config = Self::default();
        config.save_to(path)?;
        tracing::info!("Wrote default config to {:?}", path);
        Ok(config)
    }

    /// Load config from the default location, creating it on first launch.
    ///
    /// Falls back to defaults on any error.
    pub fn load_or_create() -> Self {
        let loaded = config_path()
            .ok_or_else(|| ScopeError::Config("Could not determine config path".to_string()))
            .and_then(|path| Self::load_or_create_at(path));
        loaded.unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Write the config as TOML
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScopeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScopeError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            ScopeError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

// ==================== App State ====================

/// Persistent application state
///
/// Remembers the last session so the viewer reopens where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Last port connected to
    #[serde(default)]
    pub last_port: Option<String>,

    /// Recently used ports, most recent first
    #[serde(default)]
    pub recent_ports: Vec<String>,

    /// When the last connection was made
    #[serde(default)]
    pub last_connected_at: Option<chrono::DateTime<chrono::Utc>>,

    /// View settings at exit
    #[serde(default)]
    pub view: ViewSettings,
}

fn default_app_state_version() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            last_port: None,
            recent_ports: Vec::new(),
            last_connected_at: None,
            view: ViewSettings::default(),
        }
    }
}

impl AppState {
    /// Load app state from a file; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read app state {:?}", path))?;

        serde_json::from_str(&content)
            .map_err(|e| ScopeError::Serialization(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            ScopeError::Config("Could not determine app state path".to_string())
        })?;
        Self::load_from(path)
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save app state to a file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| {
                ScopeError::Serialization(format!("Failed to serialize app state: {}", e))
            })?;

        std::fs::write(path.as_ref(), content).context("Failed to write app state")
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(dir.join(APP_STATE_FILE))
    }

    /// Record a successful connection to `port`
    pub fn add_recent_port(&mut self, port: &str) {
        let port = port.trim();
        if port.is_empty() {
            return;
        }
        self.recent_ports.retain(|p| p != port);
        self.recent_ports.insert(0, port.to_string());
        self.recent_ports.truncate(MAX_RECENT_PORTS);
        self.last_port = Some(port.to_string());
        self.last_connected_at = Some(chrono::Utc::now());
    }
}
