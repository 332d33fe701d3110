// ETWSpy - ui/panels/detail.rs
//
// Detail pane for the selected event: header fields plus the full decoded
// property list, in a scrollable two-column grid.

use crate::app::state::AppState;
use crate::core::model::braced_guid;

/// Render the detail pane (bottom panel). Hidden by the caller when no
/// row is selected.
pub fn render(ui: &mut egui::Ui, state: &mut AppState) {
    let timestamp_format = state.settings.timestamp_format;
    let Some(row) = state.selected_row() else {
        ui.weak("No event selected.");
        return;
    };

    let header = format!(
        "{}  {}  event {} (opcode {})  pid {}  tid {}",
        timestamp_format.format(row.timestamp),
        row.provider_name,
        row.event_id,
        row.opcode,
        row.process_id,
        row.thread_id,
    );
    let guid = braced_guid(&row.provider_guid);
    let level = row.level.label().to_string();
    let task = row.task.clone();
    let properties = row.properties.clone();

    ui.horizontal(|ui| {
        ui.monospace(header);
    });
    ui.horizontal(|ui| {
        ui.weak(format!("{guid}  {level}"));
        if !task.is_empty() {
            ui.weak(format!("task: {task}"));
        }
    });
    ui.separator();

    egui::ScrollArea::vertical()
        .id_salt("detail_properties")
        .auto_shrink([false; 2])
        .show(ui, |ui| {
            if properties.is_empty() {
                ui.weak("No decoded properties for this event.");
                return;
            }
            egui::Grid::new("detail_grid")
                .num_columns(2)
                .striped(true)
                .spacing([16.0, 2.0])
                .show(ui, |ui| {
                    for (name, value) in &properties {
                        ui.monospace(name);
                        ui.monospace(value);
                        ui.end_row();
                    }
                });
        });
}
