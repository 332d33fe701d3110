// ETWSpy - gui.rs
//
// Top-level eframe::App implementation.
// Wires together all UI panels and manages the session lifecycle and the
// event-queue flush loop.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::app::state::AppState;
use crate::app::trace::TraceManager;
use crate::core::catalog;
use crate::core::config_file::{self, SessionConfig};
use crate::core::model::SessionProgress;
use crate::core::pipeline::{flush_batch_size, EventQueue, EventSender, FlushController};
use crate::platform::settings;
use crate::ui;
use crate::ui::panels::filters::FilterEditor;
use crate::ui::panels::providers::ProviderEditor;
use crate::util::constants::{CONFIG_EXTENSION, CONFIG_EXTENSION_LEGACY};

/// The ETWSpy application.
pub struct EtwSpyApp {
    pub state: AppState,
    trace_manager: TraceManager,

    /// Consumer half of the bounded event queue; present while a session
    /// runs (and until fully drained after a stop).
    event_queue: Option<EventQueue>,
    event_sender: Option<EventSender>,

    flush: FlushController,
    last_flush: Instant,

    provider_editor: ProviderEditor,
    filter_editor: FilterEditor,
}

impl EtwSpyApp {
    /// Create the application, optionally auto-loading a config file
    /// (CLI argument or file-association launch).
    pub fn new(state: AppState, initial_config: Option<PathBuf>) -> Self {
        let mut app = Self {
            state,
            trace_manager: TraceManager::new(),
            event_queue: None,
            event_sender: None,
            flush: FlushController::new(),
            last_flush: Instant::now(),
            provider_editor: ProviderEditor::default(),
            filter_editor: FilterEditor::default(),
        };

        let restore = if initial_config.is_some() {
            initial_config
        } else if app.state.settings.restore_session {
            app.state.settings.last_config_path.clone()
        } else {
            None
        };
        if let Some(path) = restore {
            app.load_config(&path);
        }
        app
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    fn start_session(&mut self) {
        let (sender, queue) = EventQueue::channel();
        match self
            .trace_manager
            .start_session(self.state.providers(), sender.clone())
        {
            Ok(()) => {
                self.event_queue = Some(queue);
                self.event_sender = Some(sender);
                self.flush.reset();
                self.last_flush = Instant::now();
                self.state.session_active = true;
                self.state.dropped_events = 0;
            }
            Err(e) => {
                self.state.modal_error = Some(e.to_string());
            }
        }
    }

    fn stop_session(&mut self) {
        if let Err(e) = self.trace_manager.stop_session() {
            self.state.modal_error = Some(e.to_string());
        }
        self.state.session_active = false;
        // Drain whatever is left so no decoded events are lost.
        self.flush_events(usize::MAX);
        self.event_queue = None;
        self.event_sender = None;
        self.state.status = "Session stopped.".to_string();
    }

    /// Drain up to `max` rows from the queue into the display buffer.
    fn flush_events(&mut self, max: usize) {
        let Some(queue) = &self.event_queue else {
            return;
        };
        let batch = queue.drain(max);
        self.state.dropped_events = queue.dropped_total();
        self.state.ingest_batch(batch);
    }

    // ------------------------------------------------------------------
    // Config files
    // ------------------------------------------------------------------

    fn load_config(&mut self, path: &std::path::Path) {
        match config_file::load(path) {
            Ok(config) => {
                let providers = config.providers.len();
                let filters = config.filters.len();
                self.state.set_providers(config.providers);
                self.state.set_filters(config.filters);
                self.state.settings.last_config_path = Some(path.to_path_buf());
                self.state.status = format!(
                    "Loaded {} ({providers} providers, {filters} filters)",
                    path.display()
                );
                tracing::info!(path = %path.display(), providers, filters, "Configuration loaded");
            }
            Err(e) => {
                self.state.modal_error = Some(e.to_string());
            }
        }
    }

    fn save_config(&mut self, path: &std::path::Path) {
        let config = SessionConfig::new(
            self.state.providers().to_vec(),
            self.state.filters().entries().cloned().collect(),
        );
        match config_file::save(path, &config) {
            Ok(()) => {
                self.state.settings.last_config_path = Some(path.to_path_buf());
                self.state.status = format!("Saved {}", path.display());
            }
            Err(e) => {
                self.state.modal_error = Some(e.to_string());
            }
        }
    }

    fn import_catalog(&mut self, path: &std::path::Path) {
        match catalog::read_file(path) {
            Ok(entries) => {
                let count = entries.len();
                self.state.settings.custom_providers.extend(entries.iter().cloned());
                self.state.catalog.extend(entries);
                self.state.status = format!("Imported {count} providers from {}", path.display());
            }
            Err(e) => {
                self.state.modal_error = Some(e.to_string());
            }
        }
    }

    fn export_catalog(&mut self, path: &std::path::Path) {
        let entries = self.state.catalog.entries().to_vec();
        match catalog::write_file(path, &entries) {
            Ok(()) => {
                self.state.status =
                    format!("Exported {} providers to {}", entries.len(), path.display());
            }
            Err(e) => {
                self.state.modal_error = Some(e.to_string());
            }
        }
    }

    // ------------------------------------------------------------------
    // UI sections
    // ------------------------------------------------------------------

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Configuration...").clicked() {
                        ui.close_menu();
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter(
                                "ETWSpy configuration",
                                &[CONFIG_EXTENSION, CONFIG_EXTENSION_LEGACY],
                            )
                            .pick_file()
                        {
                            self.load_config(&path);
                        }
                    }
                    if ui.button("Save Configuration As...").clicked() {
                        ui.close_menu();
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("ETWSpy configuration", &[CONFIG_EXTENSION])
                            .set_file_name(format!("session.{CONFIG_EXTENSION}"))
                            .save_file()
                        {
                            self.save_config(&path);
                        }
                    }
                    ui.separator();
                    if ui.button("Import Provider Catalog...").clicked() {
                        ui.close_menu();
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Provider catalog", &["csv", "json"])
                            .pick_file()
                        {
                            self.import_catalog(&path);
                        }
                    }
                    if ui.button("Export Provider Catalog...").clicked() {
                        ui.close_menu();
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("CSV", &["csv"])
                            .add_filter("JSON", &["json"])
                            .set_file_name("providers.csv")
                            .save_file()
                        {
                            self.export_catalog(&path);
                        }
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ui.close_menu();
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Session", |ui| {
                    let running = self.state.session_active;
                    if ui.add_enabled(!running, egui::Button::new("Start")).clicked() {
                        ui.close_menu();
                        self.state.request_start_session = true;
                    }
                    if ui.add_enabled(running, egui::Button::new("Stop")).clicked() {
                        ui.close_menu();
                        self.state.request_stop_session = true;
                    }
                    ui.separator();
                    if ui.button("Clear Events").clicked() {
                        ui.close_menu();
                        self.state.clear_events();
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui
                        .checkbox(&mut self.state.settings.dark_mode, "Dark mode")
                        .changed()
                    {
                        ui::theme::apply(ctx, self.state.settings.dark_mode);
                    }
                    ui.checkbox(&mut self.state.settings.autoscroll, "Auto-scroll");
                    ui.menu_button("Timestamps", |ui| {
                        for format in crate::platform::settings::TimestampFormat::all() {
                            ui.selectable_value(
                                &mut self.state.settings.timestamp_format,
                                *format,
                                format.label(),
                            );
                        }
                    });
                    ui.horizontal(|ui| {
                        ui.label("Max events");
                        let mut max = self.state.settings.max_events;
                        if ui
                            .add(
                                egui::DragValue::new(&mut max)
                                    .range(
                                        crate::util::constants::MIN_MAX_DISPLAY_EVENTS
                                            ..=crate::util::constants::ABSOLUTE_MAX_DISPLAY_EVENTS,
                                    )
                                    .speed(500),
                            )
                            .changed()
                        {
                            self.state.settings.max_events = max;
                            self.state.events.set_max_events(max);
                        }
                    });
                    ui.checkbox(
                        &mut self.state.settings.restore_session,
                        "Reload last configuration on startup",
                    );
                });
            });
        });
    }

    fn status_bar(&mut self, ctx: &egui::Context) {
        let visible = self.state.visible_len();
        let total = self.state.events.len();
        let dropped = self.state.dropped_events;
        let depth = self.event_queue.as_ref().map(|q| q.depth()).unwrap_or(0);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.state.session_active {
                    ui.colored_label(ui::theme::LIVE_BADGE, "\u{25CF} LIVE");
                    ui.separator();
                }
                ui.label(&self.state.status);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("{visible} / {total} events"));
                    if depth > 0 {
                        ui.separator();
                        ui.label(format!("queue: {depth}"));
                    }
                    if dropped > 0 {
                        ui.separator();
                        ui.colored_label(
                            egui::Color32::from_rgb(251, 191, 36),
                            format!("dropped: {dropped}"),
                        );
                    }
                });
            });
        });
    }

    fn modal_error_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.state.modal_error.clone() else {
            return;
        };
        let mut open = true;
        let mut dismissed = false;
        egui::Window::new("Error")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&message);
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if !open || dismissed {
            self.state.modal_error = None;
        }
    }
}

impl eframe::App for EtwSpyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Lifecycle messages from the trace layer.
        for message in self.trace_manager.poll_progress() {
            match message {
                SessionProgress::Started { providers } => {
                    self.state.status = format!("Session running ({providers} providers).");
                }
                SessionProgress::Stopped => {
                    self.state.session_active = false;
                    self.state.status = "Session stopped.".to_string();
                }
                SessionProgress::Error {
                    message,
                    sessions_exhausted,
                } => {
                    self.state.session_active = false;
                    self.state.modal_error = Some(if sessions_exhausted {
                        format!(
                            "Windows has no free ETW session slots: {message}\n\n\
                             Stop an existing trace session (e.g. with \
                             'logman query -ets') and retry."
                        )
                    } else {
                        format!("Trace session failed: {message}")
                    });
                }
            }
        }

        // Flush the event queue on the adaptive cadence.
        if self.event_queue.is_some() {
            let interval = Duration::from_millis(self.flush.interval_ms());
            if self.last_flush.elapsed() >= interval {
                let depth = self.event_queue.as_ref().map(|q| q.depth()).unwrap_or(0);
                self.flush_events(flush_batch_size(depth));
                self.flush.record_depth(depth);
                self.last_flush = Instant::now();
            }
            // Wake up for the next flush even when the user is idle.
            ctx.request_repaint_after(Duration::from_millis(self.flush.interval_ms()));
        }

        // Requests raised by panels.
        if std::mem::take(&mut self.state.request_start_session) {
            self.start_session();
        }
        if std::mem::take(&mut self.state.request_stop_session) {
            self.stop_session();
        }

        self.menu_bar(ctx);
        self.status_bar(ctx);

        egui::TopBottomPanel::bottom("detail_pane")
            .resizable(true)
            .default_height(ui::theme::DETAIL_PANE_HEIGHT)
            .show_animated(ctx, self.state.selected.is_some(), |ui| {
                ui::panels::detail::render(ui, &mut self.state);
            });

        egui::SidePanel::left("sidebar")
            .resizable(true)
            .default_width(ui::theme::SIDEBAR_WIDTH)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.add_space(4.0);
                    ui.horizontal(|ui| {
                        let running = self.state.session_active;
                        if ui.add_enabled(!running, egui::Button::new("\u{25B6} Start")).clicked() {
                            self.state.request_start_session = true;
                        }
                        if ui.add_enabled(running, egui::Button::new("\u{25A0} Stop")).clicked() {
                            self.state.request_stop_session = true;
                        }
                    });
                    ui.separator();
                    ui::panels::providers::render(ui, &mut self.state, &mut self.provider_editor);
                    ui.separator();
                    ui::panels::filters::render(ui, &mut self.state, &mut self.filter_editor);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui::panels::events::render(ui, &mut self.state);
        });

        self.modal_error_window(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if self.trace_manager.is_running() {
            if let Err(e) = self.trace_manager.stop_session() {
                tracing::warn!(error = %e, "Failed to stop session on exit");
            }
        }
        settings::save(&self.state.settings);
    }
}
