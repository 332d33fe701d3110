// ETWSpy - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Logging initialisation (debug mode support)
// 3. Settings loading and file-association registration
// 4. eframe GUI launch

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use clap::Parser;
use std::path::PathBuf;

use etwspy::app::state::AppState;
use etwspy::gui::EtwSpyApp;
use etwspy::platform;
use etwspy::ui;
use etwspy::util;

/// Configure fonts for the egui context.
///
/// On Windows, loads Segoe UI and its emoji/symbol companions from the
/// system font directory so arrows, badges, and other symbols render
/// properly; the egui built-ins remain as final fallbacks.
fn configure_fonts(ctx: &egui::Context) {
    #[cfg(target_os = "windows")]
    {
        let mut fonts = egui::FontDefinitions::default();

        let candidates: &[(&str, &str)] = &[
            ("Segoe UI", r"C:\Windows\Fonts\segoeui.ttf"),
            ("Segoe UI Emoji", r"C:\Windows\Fonts\seguiemj.ttf"),
            ("Segoe UI Symbol", r"C:\Windows\Fonts\seguisym.ttf"),
        ];

        let mut loaded_names: Vec<&str> = Vec::new();
        for (name, path) in candidates {
            match std::fs::read(path) {
                Ok(data) => {
                    fonts
                        .font_data
                        .insert((*name).to_owned(), egui::FontData::from_owned(data).into());
                    loaded_names.push(name);
                }
                Err(e) => {
                    tracing::debug!(font = name, error = %e, "System font not loaded");
                }
            }
        }

        if !loaded_names.is_empty() {
            if let Some(proportional) = fonts.families.get_mut(&egui::FontFamily::Proportional) {
                for (i, name) in loaded_names.iter().enumerate() {
                    proportional.insert(i, (*name).to_owned());
                }
            }
            // Keep the monospace primary for grid alignment; the system
            // fonts only back-fill symbols.
            if let Some(monospace) = fonts.families.get_mut(&egui::FontFamily::Monospace) {
                for name in &loaded_names {
                    monospace.push((*name).to_owned());
                }
            }
            ctx.set_fonts(fonts);
        }
    }

    #[cfg(not(target_os = "windows"))]
    let _ = ctx;
}

/// ETWSpy - live ETW session viewer.
///
/// Configure providers, start a real-time trace session, and watch decoded
/// events stream into a filterable grid.
#[derive(Parser, Debug)]
#[command(name = "ETWSpy", version, about)]
struct Cli {
    /// Configuration file (.etwspy) to load on startup.
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    util::logging::init(cli.debug);

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "ETWSpy starting"
    );

    platform::assoc::register_file_association();

    let settings = platform::settings::load();
    let dark_mode = settings.dark_mode;
    let state = AppState::new(settings);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!(
                "{} v{}",
                util::constants::APP_NAME,
                util::constants::APP_VERSION
            ))
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 560.0]),
        ..Default::default()
    };

    let result = eframe::run_native(
        util::constants::APP_NAME,
        native_options,
        Box::new(move |cc| {
            configure_fonts(&cc.egui_ctx);
            ui::theme::apply(&cc.egui_ctx, dark_mode);
            Ok(Box::new(EtwSpyApp::new(state, cli.config)))
        }),
    );

    if let Err(e) = result {
        tracing::error!(error = %e, "Failed to launch GUI");
        eprintln!("Error: Failed to launch ETWSpy GUI: {e}");
        std::process::exit(1);
    }
}
