// ETWSpy - ui/panels/filters.rs
//
// Display-side filter panel: list of active entries plus the add form.
// Filters are editable while a session runs; the filtered view recomputes
// immediately.

use crate::app::state::AppState;
use crate::core::model::{FilterCategory, FilterEntry};

/// Edit buffers for the add-filter form.
pub struct FilterEditor {
    pub provider: String,
    pub category: FilterCategory,
    pub value: String,
    pub include: bool,
}

impl Default for FilterEditor {
    fn default() -> Self {
        Self {
            provider: String::new(),
            category: FilterCategory::EventId,
            value: String::new(),
            include: true,
        }
    }
}

/// Render the filters section of the sidebar.
pub fn render(ui: &mut egui::Ui, state: &mut AppState, editor: &mut FilterEditor) {
    ui.heading("Filters");
    ui.add_space(4.0);

    let mut remove: Option<usize> = None;
    for (index, entry) in state.filters().entries().enumerate() {
        ui.horizontal(|ui| {
            if ui.small_button("\u{2715}").on_hover_text("Remove").clicked() {
                remove = Some(index);
            }
            ui.label(entry.describe());
        });
    }
    if let Some(index) = remove {
        state.remove_filter(index);
    }

    if state.filters().is_empty() {
        ui.weak("No filters. All events are shown.");
    }

    ui.separator();

    egui::Grid::new("filter_editor")
        .num_columns(2)
        .spacing([8.0, 4.0])
        .show(ui, |ui| {
            ui.label("Provider");
            ui.text_edit_singleline(&mut editor.provider)
                .on_hover_text("Name or GUID. Empty = all providers");
            ui.end_row();

            ui.label("Field");
            egui::ComboBox::from_id_salt("filter_category")
                .selected_text(editor.category.label())
                .show_ui(ui, |ui| {
                    for category in FilterCategory::all() {
                        ui.selectable_value(&mut editor.category, *category, category.label());
                    }
                });
            ui.end_row();

            ui.label("Value");
            ui.text_edit_singleline(&mut editor.value).on_hover_text(
                "Event ID: range like 1,3-5. Process ID: decimal. \
                 Task/Payload: substring",
            );
            ui.end_row();

            ui.label("Action");
            ui.horizontal(|ui| {
                ui.radio_value(&mut editor.include, true, "Include");
                ui.radio_value(&mut editor.include, false, "Exclude");
            });
            ui.end_row();
        });

    if ui.button("Add filter").clicked() {
        let entry = FilterEntry {
            provider: editor.provider.trim().to_string(),
            category: editor.category,
            value: editor.value.trim().to_string(),
            include: editor.include,
        };
        match state.add_filter(entry) {
            Ok(()) => *editor = FilterEditor::default(),
            Err(e) => state.modal_error = Some(e.to_string()),
        }
    }
}
