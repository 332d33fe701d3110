// ETWSpy - ui/panels/providers.rs
//
// Provider configuration panel: the list of providers to enable on the
// next session start, plus the editor form for adding one.
//
// Validation happens on Add; failures surface through the modal error
// window rather than inline, so the form keeps its contents for fixing.

use crate::app::state::AppState;
use crate::core::event_ids;
use crate::core::model::{normalize_guid, ProviderConfig, TraceLevel};
use crate::util::error::ValidationError;

/// Edit buffers for the add-provider form. Owned by the app, not by
/// `AppState`, since they are pure UI scratch space.
pub struct ProviderEditor {
    pub name_or_guid: String,
    pub keywords_any: String,
    pub keywords_all: String,
    pub level: TraceLevel,
    pub trace_flags: String,
    pub kernel_flags: String,
    pub event_ids: String,
}

impl Default for ProviderEditor {
    fn default() -> Self {
        Self {
            name_or_guid: String::new(),
            keywords_any: String::new(),
            keywords_all: String::new(),
            level: TraceLevel::default(),
            trace_flags: String::new(),
            kernel_flags: String::new(),
            event_ids: String::new(),
        }
    }
}

impl ProviderEditor {
    /// Build a validated `ProviderConfig` from the form contents.
    ///
    /// The name field accepts a catalog name or a raw GUID; a name that is
    /// neither is an `UnknownProvider` error.
    fn build(&self, state: &AppState) -> Result<ProviderConfig, ValidationError> {
        let input = self.name_or_guid.trim();

        let (name, guid) = if let Some(guid) = normalize_guid(input) {
            let name = state
                .catalog
                .name_for_guid(&guid)
                .map(str::to_string)
                .unwrap_or_default();
            (name, guid)
        } else if let Some(entry) = state.catalog.resolve(input) {
            (entry.name.clone(), entry.guid.clone())
        } else {
            return Err(ValidationError::UnknownProvider {
                name: input.to_string(),
            });
        };

        let mut config = ProviderConfig::new(name, guid);
        config.keywords_any = parse_mask64(&self.keywords_any)?;
        config.keywords_all = parse_mask64(&self.keywords_all)?;
        config.level = self.level;
        config.trace_flags = parse_mask32(&self.trace_flags)?;
        config.kernel_flags = parse_mask32(&self.kernel_flags)?;
        config.event_ids = event_ids::parse_event_ids(&self.event_ids)?;
        Ok(config)
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Render the providers section of the sidebar.
pub fn render(ui: &mut egui::Ui, state: &mut AppState, editor: &mut ProviderEditor) {
    ui.heading("Providers");
    ui.add_space(4.0);

    // Current list.
    let mut remove: Option<usize> = None;
    for (index, config) in state.providers().iter().enumerate() {
        ui.horizontal(|ui| {
            if ui.small_button("\u{2715}").on_hover_text("Remove").clicked() {
                remove = Some(index);
            }
            let kind = if config.is_kernel() { "kernel" } else { "user" };
            ui.label(format!(
                "{} ({kind}, {})",
                config.display_name(),
                config.level.label()
            ))
            .on_hover_text(format!(
                "GUID: {}\nAny: {:#x}  All: {:#x}\nEvent IDs: {}",
                config.guid,
                config.keywords_any,
                config.keywords_all,
                if config.event_ids.is_empty() {
                    "all".to_string()
                } else {
                    event_ids::format_event_ids(&config.event_ids)
                }
            ));
        });
    }
    if let Some(index) = remove {
        state.remove_provider(index);
    }

    if state.providers().is_empty() {
        ui.weak("No providers configured.");
    }

    ui.separator();

    // Add form.
    egui::Grid::new("provider_editor")
        .num_columns(2)
        .spacing([8.0, 4.0])
        .show(ui, |ui| {
            ui.label("Provider");
            ui.text_edit_singleline(&mut editor.name_or_guid)
                .on_hover_text("Catalog name or GUID (braces optional)");
            ui.end_row();

            ui.label("Level");
            egui::ComboBox::from_id_salt("provider_level")
                .selected_text(editor.level.label())
                .show_ui(ui, |ui| {
                    for level in TraceLevel::all() {
                        ui.selectable_value(&mut editor.level, *level, level.label());
                    }
                });
            ui.end_row();

            ui.label("Keywords (any)");
            ui.text_edit_singleline(&mut editor.keywords_any)
                .on_hover_text("Hex mask, e.g. 0x10. Empty = 0 (all)");
            ui.end_row();

            ui.label("Keywords (all)");
            ui.text_edit_singleline(&mut editor.keywords_all);
            ui.end_row();

            ui.label("Trace flags");
            ui.text_edit_singleline(&mut editor.trace_flags)
                .on_hover_text("EnableProperty bits, hex");
            ui.end_row();

            ui.label("Kernel flags");
            ui.text_edit_singleline(&mut editor.kernel_flags)
                .on_hover_text("EVENT_TRACE_FLAG_* bits, hex. Non-zero = kernel provider");
            ui.end_row();

            ui.label("Event IDs");
            ui.text_edit_singleline(&mut editor.event_ids)
                .on_hover_text("e.g. 1,3-5,10. Empty = all events");
            ui.end_row();
        });

    let can_edit = !state.session_active;
    ui.add_enabled_ui(can_edit, |ui| {
        if ui.button("Add provider").clicked() {
            match editor.build(state) {
                Ok(config) => match state.add_provider(config) {
                    Ok(()) => editor.clear(),
                    Err(e) => state.modal_error = Some(e.to_string()),
                },
                Err(e) => state.modal_error = Some(e.to_string()),
            }
        }
    });
    if !can_edit {
        ui.weak("Stop the session to edit providers.");
    }
}

fn parse_mask64(text: &str) -> Result<u64, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|_| ValidationError::MalformedMask {
        input: text.to_string(),
    })
}

fn parse_mask32(text: &str) -> Result<u32, ValidationError> {
    let value = parse_mask64(text)?;
    u32::try_from(value).map_err(|_| ValidationError::MalformedMask {
        input: text.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::settings::Settings;

    #[test]
    fn test_parse_mask_accepts_hex_with_and_without_prefix() {
        assert_eq!(parse_mask64("0x10").unwrap(), 0x10);
        assert_eq!(parse_mask64("FF").unwrap(), 0xFF);
        assert_eq!(parse_mask64("  ").unwrap(), 0);
        assert!(parse_mask64("zz").is_err());
        assert!(parse_mask32("1ffffffff").is_err());
    }

    #[test]
    fn test_editor_resolves_catalog_name() {
        let state = AppState::new(Settings::default());
        let editor = ProviderEditor {
            name_or_guid: "Microsoft-Windows-DNS-Client".to_string(),
            ..Default::default()
        };
        let config = editor.build(&state).unwrap();
        assert_eq!(config.guid, "1C95126E-7EEA-49A9-A3FE-A378B03DDB4D");
    }

    #[test]
    fn test_editor_accepts_raw_guid() {
        let state = AppState::new(Settings::default());
        let editor = ProviderEditor {
            name_or_guid: "{11111111-2222-3333-4444-555555555555}".to_string(),
            ..Default::default()
        };
        let config = editor.build(&state).unwrap();
        assert_eq!(config.guid, "11111111-2222-3333-4444-555555555555");
        assert!(config.name.is_empty());
    }

    #[test]
    fn test_editor_rejects_unknown_name() {
        let state = AppState::new(Settings::default());
        let editor = ProviderEditor {
            name_or_guid: "No-Such-Provider".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            editor.build(&state).unwrap_err(),
            ValidationError::UnknownProvider { .. }
        ));
    }
}
