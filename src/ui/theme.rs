// ETWSpy - ui/theme.rs
//
// Colour scheme, level colour mapping, and layout constants.
// No dependencies on app state or business logic.

use crate::core::model::TraceLevel;
use egui::Color32;

/// Colour for a trace level, tuned per theme for contrast.
pub fn level_colour(level: TraceLevel, dark_mode: bool) -> Color32 {
    if dark_mode {
        match level {
            TraceLevel::Critical => Color32::from_rgb(248, 113, 113), // Red 400
            TraceLevel::Error => Color32::from_rgb(239, 68, 68),      // Red 500
            TraceLevel::Warning => Color32::from_rgb(251, 191, 36),   // Amber 400
            TraceLevel::Information => Color32::from_rgb(209, 213, 219), // Gray 300
            TraceLevel::Verbose => Color32::from_rgb(107, 114, 128),  // Gray 500
            TraceLevel::LogAlways => Color32::from_rgb(147, 197, 253), // Blue 300
        }
    } else {
        match level {
            TraceLevel::Critical => Color32::from_rgb(185, 28, 28), // Red 700
            TraceLevel::Error => Color32::from_rgb(220, 38, 38),    // Red 600
            TraceLevel::Warning => Color32::from_rgb(180, 83, 9),   // Amber 700
            TraceLevel::Information => Color32::from_rgb(55, 65, 81), // Gray 700
            TraceLevel::Verbose => Color32::from_rgb(107, 114, 128), // Gray 500
            TraceLevel::LogAlways => Color32::from_rgb(29, 78, 216), // Blue 700
        }
    }
}

/// High-contrast foreground for row body text.
pub fn row_text_colour(dark_mode: bool) -> Color32 {
    if dark_mode {
        Color32::from_rgb(229, 231, 235) // Gray 200
    } else {
        Color32::from_rgb(17, 24, 39) // Gray 900
    }
}

/// Badge colour for the live-session indicator.
pub const LIVE_BADGE: Color32 = Color32::from_rgb(34, 197, 94); // Green 500

/// Layout constants.
pub const SIDEBAR_WIDTH: f32 = 300.0;
pub const DETAIL_PANE_HEIGHT: f32 = 200.0;
pub const ROW_HEIGHT: f32 = 20.0;

/// Apply the selected visuals to the whole context.
pub fn apply(ctx: &egui::Context, dark_mode: bool) {
    if dark_mode {
        ctx.set_visuals(egui::Visuals::dark());
    } else {
        ctx.set_visuals(egui::Visuals::light());
    }
}
