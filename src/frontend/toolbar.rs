//! Toolbar panel: port, connection, signal and scale controls.
//!
//! Sits at the top of the window, above the status row and the plot.

use egui::{Color32, RichText, Ui};

use crate::config::ScaleMode;
use crate::frontend::AppAction;
use crate::types::{ConnectionStatus, Schema};

/// Context needed to render the toolbar.
pub struct ToolbarContext<'a> {
    pub status: ConnectionStatus,
    pub schema: &'a Schema,
    pub selected_signal: Option<&'a str>,
    pub scale_mode: ScaleMode,
    pub available_ports: &'a [String],
    pub recent_ports: &'a [String],
}

/// Status dot color for a connection state
pub fn status_color(status: ConnectionStatus) -> Color32 {
    match status {
        ConnectionStatus::Connected => Color32::GREEN,
        ConnectionStatus::Connecting => Color32::YELLOW,
        ConnectionStatus::Lost => Color32::from_rgb(255, 140, 0),
        ConnectionStatus::Error => Color32::RED,
        ConnectionStatus::Disconnected => Color32::GRAY,
    }
}

/// Render the toolbar. `port_input` is edited in place.
///
/// Returns actions to be applied by the app.
pub fn render_toolbar(
    ui: &mut Ui,
    ctx: &ToolbarContext<'_>,
    port_input: &mut String,
) -> Vec<AppAction> {
    let mut actions = Vec::new();

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 4.0;

        // === Connection group ===
        render_connection_group(ui, ctx, port_input, &mut actions);

        ui.separator();

        // === View group ===
        render_view_group(ui, ctx, &mut actions);

        ui.separator();

        if ui
            .button("Clear")
            .on_hover_text("Discard all samples and wait for a new header")
            .clicked()
        {
            actions.push(AppAction::Clear);
        }
    });

    actions
}

fn render_connection_group(
    ui: &mut Ui,
    ctx: &ToolbarContext<'_>,
    port_input: &mut String,
    actions: &mut Vec<AppAction>,
) {
    ui.colored_label(status_color(ctx.status), "●");

    if ctx.status.is_active() {
        ui.add_enabled(false, egui::TextEdit::singleline(port_input).desired_width(180.0));
        let btn = egui::Button::new(RichText::new("Disconnect").color(Color32::WHITE))
            .fill(Color32::from_rgb(50, 120, 50));
        if ui.add(btn).on_hover_text("Close the serial port").clicked() {
            actions.push(AppAction::Disconnect);
        }
        return;
    }

    let response = ui.add(
        egui::TextEdit::singleline(port_input)
            .hint_text("Serial port")
            .desired_width(180.0),
    );
    let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

    egui::ComboBox::from_id_salt("toolbar_port_selector")
        .selected_text("▼")
        .width(200.0)
        .show_ui(ui, |ui| {
            if ctx.available_ports.is_empty() && ctx.recent_ports.is_empty() {
                ui.label("No ports found");
            }
            for port in ctx.available_ports {
                ui.selectable_value(port_input, port.clone(), port.as_str());
            }
            let recent: Vec<_> = ctx
                .recent_ports
                .iter()
                .filter(|p| !ctx.available_ports.contains(p))
                .collect();
            if !recent.is_empty() {
                ui.separator();
                for port in recent {
                    ui.selectable_value(port_input, port.clone(), format!("{} (recent)", port));
                }
            }
            ui.separator();
            if ui.button("Refresh").clicked() {
                actions.push(AppAction::RefreshPorts);
            }
        });

    let can_connect = !port_input.trim().is_empty();
    if (ui.add_enabled(can_connect, egui::Button::new("Connect")).clicked() || submitted)
        && can_connect
    {
        actions.push(AppAction::Connect(port_input.trim().to_string()));
    }
}

fn render_view_group(ui: &mut Ui, ctx: &ToolbarContext<'_>, actions: &mut Vec<AppAction>) {
    ui.label("Signal:");
    let selected_text = ctx.selected_signal.unwrap_or("-").to_string();
    ui.add_enabled_ui(!ctx.schema.is_empty(), |ui| {
        egui::ComboBox::from_id_salt("toolbar_signal_selector")
            .selected_text(selected_text)
            .width(120.0)
            .show_ui(ui, |ui| {
                for column in ctx.schema.columns() {
                    let selected = ctx.selected_signal == Some(column.as_str());
                    if ui.selectable_label(selected, column.as_str()).clicked() && !selected {
                        actions.push(AppAction::SelectSignal(column.clone()));
                    }
                }
            });
    });

    ui.label("Y-Scale:");
    egui::ComboBox::from_id_salt("toolbar_scale_selector")
        .selected_text(ctx.scale_mode.display_name())
        .width(70.0)
        .show_ui(ui, |ui| {
            for mode in ScaleMode::all() {
                let selected = ctx.scale_mode == mode;
                if ui.selectable_label(selected, mode.display_name()).clicked() && !selected {
                    actions.push(AppAction::SelectScaleMode(mode));
                }
            }
        });
}
