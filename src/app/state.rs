// ETWSpy - app/state.rs
//
// Central application state shared across UI panels.
//
// Owns the provider configuration list, the filter set, the display buffer
// and its filtered view, and the transient UI state (selection, status
// line, modal errors). Session control lives in app::trace; this module
// never blocks.

use crate::core::catalog::ProviderCatalog;
use crate::core::filter::FilterSet;
use crate::core::model::{EventRow, FilterEntry, ProviderConfig};
use crate::core::pipeline::DisplayBuffer;
use crate::platform::settings::Settings;
use crate::util::constants::MAX_PROVIDERS_PER_SESSION;
use crate::util::error::ValidationError;

pub struct AppState {
    /// Providers to enable on the next session start.
    providers: Vec<ProviderConfig>,

    /// Display-side filter set.
    filters: FilterSet,

    /// All retained events, capped FIFO.
    pub events: DisplayBuffer,

    /// Indices into `events` that pass the filter set. Rebuilt lazily:
    /// eviction and filter edits both shift what is visible.
    filtered: Vec<usize>,
    filtered_dirty: bool,

    /// Selected row, as an index into the filtered view.
    pub selected: Option<usize>,

    /// One-line status shown in the status bar.
    pub status: String,

    /// Pending modal error text; rendered as a blocking window until
    /// dismissed.
    pub modal_error: Option<String>,

    /// True while a trace session is running.
    pub session_active: bool,

    /// Total events dropped at the queue since session start.
    pub dropped_events: usize,

    /// Persisted user settings.
    pub settings: Settings,

    /// Provider name directory: built-ins plus the user's custom list.
    pub catalog: ProviderCatalog,

    /// Set by panels to request a session start/stop; handled in the
    /// next `update` pass where the trace manager lives.
    pub request_start_session: bool,
    pub request_stop_session: bool,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let events = DisplayBuffer::new(settings.max_events);
        let mut catalog = ProviderCatalog::with_builtin();
        catalog.extend(settings.custom_providers.iter().cloned());
        Self {
            providers: Vec::new(),
            filters: FilterSet::new(),
            events,
            filtered: Vec::new(),
            filtered_dirty: false,
            selected: None,
            status: format!("{} ready", crate::util::constants::APP_NAME),
            modal_error: None,
            session_active: false,
            dropped_events: 0,
            settings,
            catalog,
            request_start_session: false,
            request_stop_session: false,
        }
    }

    // ------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// Add a provider after validation. Rejects a duplicate GUID and
    /// enforces the per-session provider limit.
    pub fn add_provider(&mut self, mut config: ProviderConfig) -> Result<(), ValidationError> {
        config.validate()?;
        if self.providers.iter().any(|p| p.guid == config.guid) {
            return Err(ValidationError::DuplicateProvider {
                name: config.display_name().to_string(),
            });
        }
        if self.providers.len() >= MAX_PROVIDERS_PER_SESSION {
            return Err(ValidationError::TooManyProviders {
                count: self.providers.len() + 1,
                max: MAX_PROVIDERS_PER_SESSION,
            });
        }
        self.providers.push(config);
        Ok(())
    }

    pub fn remove_provider(&mut self, index: usize) {
        if index < self.providers.len() {
            self.providers.remove(index);
        }
    }

    pub fn update_provider(&mut self, index: usize, config: ProviderConfig) {
        if let Some(slot) = self.providers.get_mut(index) {
            *slot = config;
        }
    }

    /// Replace the provider list wholesale (config file load). Entries are
    /// assumed validated by the loader.
    pub fn set_providers(&mut self, providers: Vec<ProviderConfig>) {
        self.providers = providers;
    }

    // ------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn add_filter(&mut self, entry: FilterEntry) -> Result<(), ValidationError> {
        self.filters.add(entry)?;
        self.invalidate_filtered();
        Ok(())
    }

    pub fn remove_filter(&mut self, index: usize) {
        self.filters.remove(index);
        self.invalidate_filtered();
    }

    /// Replace all filters (config file load). Invalid entries are skipped
    /// with a warning rather than rejecting the whole file.
    pub fn set_filters(&mut self, entries: Vec<FilterEntry>) {
        self.filters.clear();
        for entry in entries {
            if let Err(e) = self.filters.add(entry) {
                tracing::warn!(error = %e, "Skipping invalid filter entry from config");
            }
        }
        self.invalidate_filtered();
    }

    // ------------------------------------------------------------------
    // Events and the filtered view
    // ------------------------------------------------------------------

    /// Append a drained batch to the display buffer.
    pub fn ingest_batch(&mut self, batch: Vec<EventRow>) {
        if batch.is_empty() {
            return;
        }
        self.events.push_batch(batch);
        self.invalidate_filtered();
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
        self.selected = None;
        self.invalidate_filtered();
    }

    /// Number of rows currently passing the filters.
    pub fn visible_len(&mut self) -> usize {
        self.rebuild_filtered_if_dirty();
        self.filtered.len()
    }

    /// Row at position `index` of the filtered view.
    pub fn visible_row(&mut self, index: usize) -> Option<&EventRow> {
        self.rebuild_filtered_if_dirty();
        self.filtered.get(index).and_then(|&i| self.events.get(i))
    }

    /// The currently selected row, if any.
    pub fn selected_row(&mut self) -> Option<&EventRow> {
        let index = self.selected?;
        self.visible_row(index)
    }

    fn invalidate_filtered(&mut self) {
        self.filtered_dirty = true;
    }

    fn rebuild_filtered_if_dirty(&mut self) {
        if !self.filtered_dirty {
            return;
        }
        self.filtered.clear();
        for (index, row) in self.events.iter().enumerate() {
            if self.filters.allows(row) {
                self.filtered.push(index);
            }
        }
        // Selection is positional in the filtered view; clamp it.
        if let Some(selected) = self.selected {
            if selected >= self.filtered.len() {
                self.selected = None;
            }
        }
        self.filtered_dirty = false;
    }
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{FilterCategory, TraceLevel};
    use chrono::Utc;

    fn state() -> AppState {
        AppState::new(Settings::default())
    }

    fn row(id: u64, event_id: u16) -> EventRow {
        EventRow {
            id,
            timestamp: Utc::now(),
            provider_name: "Test".into(),
            provider_guid: "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716".into(),
            event_id,
            opcode: 0,
            level: TraceLevel::Information,
            process_id: 0,
            thread_id: 0,
            task: String::new(),
            properties: Vec::new(),
        }
    }

    #[test]
    fn test_duplicate_provider_guid_rejected() {
        let mut state = state();
        state
            .add_provider(ProviderConfig::new(
                "A",
                "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716",
            ))
            .unwrap();

        // Same GUID in a different textual form is still a duplicate.
        let err = state
            .add_provider(ProviderConfig::new(
                "B",
                "{22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716}",
            ))
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateProvider { .. }));
        assert_eq!(state.providers().len(), 1);
    }

    #[test]
    fn test_invalid_provider_guid_rejected() {
        let mut state = state();
        let err = state
            .add_provider(ProviderConfig::new("X", "not-a-guid"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidGuid { .. }));
    }

    #[test]
    fn test_filtered_view_tracks_filter_edits() {
        let mut state = state();
        state.ingest_batch(vec![row(1, 1), row(2, 2), row(3, 3)]);
        assert_eq!(state.visible_len(), 3);

        state
            .add_filter(FilterEntry {
                provider: String::new(),
                category: FilterCategory::EventId,
                value: "2".into(),
                include: true,
            })
            .unwrap();
        assert_eq!(state.visible_len(), 1);
        assert_eq!(state.visible_row(0).map(|r| r.id), Some(2));

        state.remove_filter(0);
        assert_eq!(state.visible_len(), 3);
    }

    #[test]
    fn test_selection_cleared_when_it_falls_off_the_view() {
        let mut state = state();
        state.ingest_batch(vec![row(1, 1), row(2, 2)]);
        state.selected = Some(1);

        state
            .add_filter(FilterEntry {
                provider: String::new(),
                category: FilterCategory::EventId,
                value: "1".into(),
                include: true,
            })
            .unwrap();
        assert_eq!(state.visible_len(), 1);
        assert_eq!(state.selected, None);
    }

    #[test]
    fn test_set_filters_skips_invalid_entries() {
        let mut state = state();
        state.set_filters(vec![
            FilterEntry {
                provider: String::new(),
                category: FilterCategory::EventId,
                value: "1-3".into(),
                include: true,
            },
            FilterEntry {
                provider: String::new(),
                category: FilterCategory::EventId,
                value: "9-1".into(),
                include: true,
            },
        ]);
        assert_eq!(state.filters().len(), 1);
    }
}
