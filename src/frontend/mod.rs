//! Frontend module for egui UI
//!
//! The viewer only reads: it polls the [`ScopeEngine`] once per frame and
//! draws snapshots of the signal store. It never touches the serial port.
//!
//! # Main Types
//!
//! - [`ScopeApp`] - Main application state implementing [`eframe::App`]
//! - [`AppAction`] - User intents returned by the panels
//! - [`ScopePlot`] - Plot configuration and rendering
//!
//! # Layout
//!
//! - `toolbar` - Port field, connect/disconnect, signal and Y-scale selectors, clear
//! - `status_bar` - Detection status, data point count, rejected rows
//! - `plot` - The selected signal over a sliding sample window

mod plot;
pub mod status_bar;
pub mod toolbar;

pub use plot::{plot_bounds, ScopePlot};

use std::time::Duration;

use crate::backend::{available_ports, EngineEvent, ScopeEngine};
use crate::config::{AppConfig, AppState, ScaleMode};
use status_bar::{render_status_bar, StatusBarContext};
use toolbar::{render_toolbar, ToolbarContext};

/// Actions produced by the UI panels.
///
/// Panels return `Vec<AppAction>` instead of mutating state directly.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Open the given port and start ingesting
    Connect(String),
    /// Close the current connection
    Disconnect,
    /// Discard all samples and wait for a new header
    Clear,
    /// Plot another column
    SelectSignal(String),
    /// Change the Y-axis scaling
    SelectScaleMode(ScaleMode),
    /// Re-enumerate serial ports
    RefreshPorts,
}

/// Main application state
pub struct ScopeApp {
    engine: ScopeEngine,
    app_state: AppState,
    plot: ScopePlot,
    port_input: String,
    available_ports: Vec<String>,
    repaint_interval: Duration,
}

impl ScopeApp {
    /// Create the app from the eframe creation context
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, app_state: AppState) -> Self {
        if config.ui.dark_mode {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
        } else {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
        }
        Self::with_engine(ScopeEngine::new(config), app_state)
    }

    /// Create the app around an existing engine
    pub fn with_engine(mut engine: ScopeEngine, app_state: AppState) -> Self {
        let config = engine.config().clone();
        engine.restore_view(app_state.view.clone());

        let port_input = app_state
            .last_port
            .clone()
            .unwrap_or_else(|| config.ui.default_port.clone());

        Self {
            engine,
            app_state,
            plot: ScopePlot::from_config(&config.ui),
            port_input,
            available_ports: available_ports(),
            repaint_interval: Duration::from_millis(config.ui.repaint_interval_ms.max(1)),
        }
    }

    pub fn engine(&self) -> &ScopeEngine {
        &self.engine
    }

    pub fn app_state(&self) -> &AppState {
        &self.app_state
    }

    /// Apply one user action
    pub fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::Connect(port) => match self.engine.connect(&port) {
                Ok(()) => {
                    self.app_state.add_recent_port(&port);
                    self.port_input = port;
                }
                Err(e) => tracing::warn!("Connect failed: {}", e),
            },
            AppAction::Disconnect => self.engine.disconnect(),
            AppAction::Clear => self.engine.clear(),
            AppAction::SelectSignal(name) => {
                if !self.engine.select_signal(&name) {
                    tracing::debug!("Ignored selection of unknown signal {:?}", name);
                }
            }
            AppAction::SelectScaleMode(mode) => self.engine.select_scale_mode(mode),
            AppAction::RefreshPorts => self.available_ports = available_ports(),
        }
        self.app_state.view = self.engine.view().clone();
    }

    /// Poll the engine; returns true if anything happened
    fn process_engine_events(&mut self) -> bool {
        let events = self.engine.poll();
        for event in &events {
            match event {
                EngineEvent::SchemaChanged(columns) => {
                    tracing::debug!("Viewer switched to {} columns", columns.len());
                }
                EngineEvent::Disconnected(reason) => {
                    tracing::info!("Device disconnected: {}", reason);
                }
                _ => {}
            }
        }
        self.app_state.view = self.engine.view().clone();
        !events.is_empty()
    }
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let had_events = self.process_engine_events();

        if self.engine.status().is_active() {
            ctx.request_repaint_after(self.repaint_interval);
        } else if had_events {
            ctx.request_repaint();
        }

        let schema = self.engine.schema();
        let view = self.engine.view().clone();
        let mut actions = Vec::new();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            let toolbar_ctx = ToolbarContext {
                status: self.engine.status(),
                schema: &schema,
                selected_signal: view.selected_signal.as_deref(),
                scale_mode: view.scale_mode,
                available_ports: &self.available_ports,
                recent_ports: &self.app_state.recent_ports,
            };
            actions.extend(render_toolbar(ui, &toolbar_ctx, &mut self.port_input));
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            let detection = self.engine.detection_status();
            let status_ctx = StatusBarContext {
                status: self.engine.status(),
                address: self.engine.address(),
                detection: &detection,
                total_rows: self.engine.store().total_rows(),
                stats: self.engine.stats(),
                connected_since: self
                    .engine
                    .connected_at()
                    .map(|t| t.format("%H:%M:%S").to_string()),
                last_error: self.engine.last_error(),
                signal_stats: view
                    .selected_signal
                    .as_deref()
                    .zip(self.engine.selected_stats()),
            };
            render_status_bar(ui, &status_ctx);
        });

        egui::CentralPanel::default().show(ctx, |ui| match view.selected_signal.as_deref() {
            Some(name) => {
                let samples = self.engine.store().snapshot(name).unwrap_or_default();
                self.plot.render(
                    ui,
                    name,
                    &samples,
                    view.scale_mode,
                    self.engine.store().capacity(),
                );
            }
            None => {
                ui.centered_and_justified(|ui| {
                    ui.label(self.engine.detection_status());
                });
            }
        });

        for action in actions {
            self.handle_action(action);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.engine.disconnect();
        self.app_state.view = self.engine.view().clone();

        if let Err(e) = self.app_state.save() {
            tracing::warn!("Failed to save app state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionStatus;

    fn test_app() -> ScopeApp {
        ScopeApp::with_engine(ScopeEngine::new(AppConfig::default()), AppState::default())
    }

    #[test]
    fn test_port_input_prefers_last_port() {
        let mut state = AppState::default();
        state.add_recent_port("/dev/ttyUSB3");
        let app = ScopeApp::with_engine(ScopeEngine::new(AppConfig::default()), state);
        assert_eq!(app.port_input, "/dev/ttyUSB3");

        let app = test_app();
        assert_eq!(app.port_input, AppConfig::default().ui.default_port);
    }

    #[test]
    fn test_failed_connect_is_not_remembered() {
        let mut app = test_app();
        app.handle_action(AppAction::Connect("/dev/csvscope-missing".into()));
        assert_eq!(app.engine().status(), ConnectionStatus::Error);
        assert!(app.app_state().recent_ports.is_empty());
    }

    #[test]
    fn test_scale_mode_is_persisted_in_state() {
        let mut app = test_app();
        app.handle_action(AppAction::SelectScaleMode(ScaleMode::Fixed(20.0)));
        assert_eq!(app.app_state().view.scale_mode, ScaleMode::Fixed(20.0));
    }

    #[test]
    fn test_unknown_signal_is_ignored() {
        let mut app = test_app();
        app.handle_action(AppAction::SelectSignal("AccX".into()));
        assert_eq!(app.engine().view().selected_signal, None);
    }
}
