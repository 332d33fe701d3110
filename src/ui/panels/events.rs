// ETWSpy - ui/panels/events.rs
//
// Virtual-scrolling event grid (central area).
//
// Uses egui's `ScrollArea::show_rows` which renders only the rows currently
// visible in the viewport, so rendering cost stays flat regardless of how
// many events the display buffer holds.
//
// Each row is a LayoutJob: the level badge keeps its level-specific hue
// while timestamp / provider / payload use the high-contrast body colour.

use crate::app::state::AppState;
use crate::ui::theme;
use egui::text::{LayoutJob, TextFormat};

/// Render the events panel (central area).
pub fn render(ui: &mut egui::Ui, state: &mut AppState) {
    let visible = state.visible_len();

    if visible == 0 {
        ui.centered_and_justified(|ui| {
            if state.events.is_empty() {
                ui.label("No events. Configure a provider and start the session.");
            } else {
                ui.label("No events match the current filters.");
            }
        });
        return;
    }

    let row_height = theme::ROW_HEIGHT;
    let stick = state.session_active && state.settings.autoscroll;
    let dark_mode = state.settings.dark_mode;
    let timestamp_format = state.settings.timestamp_format;
    let selected = state.selected;

    let mut clicked: Option<usize> = None;

    egui::ScrollArea::vertical()
        .auto_shrink([false; 2])
        .stick_to_bottom(stick)
        .show_rows(ui, row_height, visible, |ui, row_range| {
            for display_idx in row_range {
                let Some(row) = state.visible_row(display_idx) else {
                    continue;
                };

                let level = row.level;
                let font = egui::FontId::monospace(12.0);

                let mut job = LayoutJob::default();
                job.append(
                    &format!("[{:<4}] ", level.short_label()),
                    0.0,
                    TextFormat {
                        font_id: font.clone(),
                        color: theme::level_colour(level, dark_mode),
                        ..Default::default()
                    },
                );
                job.append(
                    &format!(
                        "{} | {:>28} | {:>5} | {:>6} | {:<20} | {}",
                        timestamp_format.format(row.timestamp),
                        truncate(&row.provider_name, 28),
                        row.event_id,
                        row.process_id,
                        truncate(&row.task, 20),
                        row.summary(),
                    ),
                    0.0,
                    TextFormat {
                        font_id: font,
                        color: theme::row_text_colour(dark_mode),
                        ..Default::default()
                    },
                );

                let is_selected = selected == Some(display_idx);
                let response = ui.selectable_label(is_selected, job);
                if response.clicked() {
                    clicked = Some(display_idx);
                }
            }
        });

    if let Some(display_idx) = clicked {
        // Clicking the selected row deselects it.
        state.selected = if state.selected == Some(display_idx) {
            None
        } else {
            Some(display_idx)
        };
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    }
}
