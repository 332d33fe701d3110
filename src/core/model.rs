// ETWSpy - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no UI,
// no platform dependencies (core depends on std + serde/chrono only).
//
// These types are the shared vocabulary across all layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::util::error::ValidationError;

// =============================================================================
// Trace level
// =============================================================================

/// ETW trace verbosity levels, as passed to EnableTraceEx2.
///
/// Ordered from least to most verbose; enabling a level enables everything
/// at or below it on the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    LogAlways,
    Critical,
    Error,
    Warning,
    Information,
    Verbose,
}

impl Default for TraceLevel {
    fn default() -> Self {
        TraceLevel::Verbose
    }
}

impl TraceLevel {
    /// Returns all variants in display order.
    pub fn all() -> &'static [TraceLevel] {
        &[
            TraceLevel::LogAlways,
            TraceLevel::Critical,
            TraceLevel::Error,
            TraceLevel::Warning,
            TraceLevel::Information,
            TraceLevel::Verbose,
        ]
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            TraceLevel::LogAlways => "LogAlways",
            TraceLevel::Critical => "Critical",
            TraceLevel::Error => "Error",
            TraceLevel::Warning => "Warning",
            TraceLevel::Information => "Information",
            TraceLevel::Verbose => "Verbose",
        }
    }

    /// Short label for compact display (e.g. grid columns).
    pub fn short_label(&self) -> &'static str {
        match self {
            TraceLevel::LogAlways => "ALWS",
            TraceLevel::Critical => "CRIT",
            TraceLevel::Error => "ERR",
            TraceLevel::Warning => "WARN",
            TraceLevel::Information => "INFO",
            TraceLevel::Verbose => "VERB",
        }
    }

    /// The raw level byte used by the ETW APIs.
    pub fn as_u8(&self) -> u8 {
        match self {
            TraceLevel::LogAlways => 0,
            TraceLevel::Critical => 1,
            TraceLevel::Error => 2,
            TraceLevel::Warning => 3,
            TraceLevel::Information => 4,
            TraceLevel::Verbose => 5,
        }
    }

    /// Map a raw level byte from an event header back to a variant.
    /// Unknown values clamp to Verbose (providers may emit custom levels).
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TraceLevel::LogAlways,
            1 => TraceLevel::Critical,
            2 => TraceLevel::Error,
            3 => TraceLevel::Warning,
            4 => TraceLevel::Information,
            _ => TraceLevel::Verbose,
        }
    }
}

impl std::fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// GUID handling
// =============================================================================

/// Normalise a GUID string to canonical uppercase `XXXXXXXX-XXXX-...` form
/// without braces. Accepts optional surrounding `{}`.
///
/// Returns `None` if the input is not of the 8-4-4-4-12 hex form.
pub fn normalize_guid(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);

    let groups: Vec<&str> = inner.split('-').collect();
    const GROUP_LENS: [usize; 5] = [8, 4, 4, 4, 12];
    if groups.len() != GROUP_LENS.len() {
        return None;
    }
    for (group, expected) in groups.iter().zip(GROUP_LENS) {
        if group.len() != expected || !group.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
    }
    Some(inner.to_ascii_uppercase())
}

/// Render a canonical GUID with surrounding braces, the form written to
/// catalog files and shown in the UI.
pub fn braced_guid(guid: &str) -> String {
    format!("{{{guid}}}")
}

// =============================================================================
// Event row (normalised output of TDH decoding)
// =============================================================================

/// A single decoded event as displayed in the grid.
///
/// Built inside the native callback from the event header plus the
/// TDH-decoded property bag; everything downstream (filtering, display,
/// detail pane) works from this flat structure.
#[derive(Debug, Clone, Serialize)]
pub struct EventRow {
    /// Monotonically increasing unique ID within the session.
    pub id: u64,

    /// Event timestamp in UTC, converted from the event header.
    pub timestamp: DateTime<Utc>,

    /// Provider display name; falls back to the GUID when no schema name
    /// is available.
    pub provider_name: String,

    /// Canonical (unbraced, uppercase) provider GUID.
    pub provider_guid: String,

    /// Event ID from the event descriptor.
    pub event_id: u16,

    /// Opcode from the event descriptor.
    pub opcode: u8,

    /// Verbosity level from the event header.
    pub level: TraceLevel,

    /// Producing process ID.
    pub process_id: u32,

    /// Producing thread ID.
    pub thread_id: u32,

    /// Task name from the schema (empty when the schema has none).
    pub task: String,

    /// Decoded payload properties as (name, rendered value) pairs,
    /// in schema order.
    pub properties: Vec<(String, String)>,
}

impl EventRow {
    /// One-line payload summary for the grid's message column.
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(self.properties.len());
        for (name, value) in &self.properties {
            parts.push(format!("{name}={value}"));
        }
        parts.join("  ")
    }
}

// =============================================================================
// Provider configuration
// =============================================================================

/// Configuration for one provider to enable on the session.
///
/// This is what the user edits in the providers panel and what is stored in
/// `.etwspy` files; `app::trace` turns it into a wrapped-library provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name. May be empty when the user entered a bare GUID.
    #[serde(default)]
    pub name: String,

    /// Canonical provider GUID (unbraced, uppercase).
    pub guid: String,

    /// EnableTraceEx2 MatchAnyKeyword mask.
    #[serde(default)]
    pub keywords_any: u64,

    /// EnableTraceEx2 MatchAllKeyword mask.
    #[serde(default)]
    pub keywords_all: u64,

    /// Verbosity level to enable.
    #[serde(default)]
    pub level: TraceLevel,

    /// EnableParameters.EnableProperty bits (SID, stack trace, ...).
    #[serde(default)]
    pub trace_flags: u32,

    /// Kernel enable-flag bits; non-zero marks this as a kernel-mode
    /// provider routed to the system logger.
    #[serde(default)]
    pub kernel_flags: u32,

    /// OS-side event-id filter. Empty = all events.
    #[serde(default)]
    pub event_ids: BTreeSet<u16>,
}

impl ProviderConfig {
    /// Create a config for a user-mode provider from an already-normalised
    /// GUID, with defaults matching EnableTraceEx2's permissive baseline.
    pub fn new(name: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: guid.into(),
            keywords_any: 0,
            keywords_all: 0,
            level: TraceLevel::default(),
            trace_flags: 0,
            kernel_flags: 0,
            event_ids: BTreeSet::new(),
        }
    }

    /// True for kernel-mode providers (enabled via system-logger flags
    /// rather than EnableTraceEx2).
    pub fn is_kernel(&self) -> bool {
        self.kernel_flags != 0
    }

    /// Validate the GUID field, normalising it in place.
    pub fn validate(&mut self) -> std::result::Result<(), ValidationError> {
        match normalize_guid(&self.guid) {
            Some(canonical) => {
                self.guid = canonical;
                Ok(())
            }
            None => Err(ValidationError::InvalidGuid {
                input: self.guid.clone(),
            }),
        }
    }

    /// Label used in the providers panel and in filter provider matching.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.guid
        } else {
            &self.name
        }
    }
}

// =============================================================================
// Filter entries
// =============================================================================

/// The event field a filter entry tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterCategory {
    /// Matches the event descriptor's ID against a range expression.
    EventId,
    /// Matches the producing process ID exactly.
    ProcessId,
    /// Matches the schema task name (case-insensitive substring).
    TaskName,
    /// Matches any decoded property value (case-insensitive substring).
    Payload,
}

impl FilterCategory {
    pub fn all() -> &'static [FilterCategory] {
        &[
            FilterCategory::EventId,
            FilterCategory::ProcessId,
            FilterCategory::TaskName,
            FilterCategory::Payload,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterCategory::EventId => "Event ID",
            FilterCategory::ProcessId => "Process ID",
            FilterCategory::TaskName => "Task Name",
            FilterCategory::Payload => "Payload",
        }
    }
}

/// A single display-side filter predicate.
///
/// `provider` scopes the entry to one provider (by name or GUID); empty
/// means it applies to events from every provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    /// Provider scope: display name or canonical GUID; empty = all.
    #[serde(default)]
    pub provider: String,

    /// Which event field this entry tests.
    pub category: FilterCategory,

    /// The value to test: a range expression for EventId, a decimal PID
    /// for ProcessId, a substring otherwise.
    pub value: String,

    /// True to include matching events, false to exclude them.
    pub include: bool,
}

impl FilterEntry {
    /// Compact description used in duplicate-rejection errors and the
    /// filters panel list.
    pub fn describe(&self) -> String {
        let action = if self.include { "include" } else { "exclude" };
        let scope = if self.provider.is_empty() {
            "any provider".to_string()
        } else {
            self.provider.clone()
        };
        format!("{action} {} '{}' ({scope})", self.category.label(), self.value)
    }
}

// =============================================================================
// Session progress (control messages, trace thread -> UI)
// =============================================================================

/// Control messages sent from the session layer to the UI thread.
///
/// Decoded events do NOT travel this channel; they go through the bounded
/// event queue. This channel is for low-rate lifecycle signals only.
#[derive(Debug, Clone)]
pub enum SessionProgress {
    /// The native session started and the processing thread is running.
    Started { providers: usize },

    /// The session stopped (user request or processing thread exit).
    Stopped,

    /// Session start or processing failed.
    ///
    /// `sessions_exhausted` distinguishes Windows' concurrent-session limit
    /// so the UI can prompt with remediation.
    Error {
        message: String,
        sessions_exhausted: bool,
    },
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_guid_accepts_braced_and_bare() {
        let canonical = "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716";
        assert_eq!(
            normalize_guid("{22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716}").as_deref(),
            Some(canonical)
        );
        assert_eq!(
            normalize_guid("22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716").as_deref(),
            Some(canonical)
        );
        assert_eq!(
            normalize_guid("  {22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716}  ").as_deref(),
            Some(canonical)
        );
    }

    #[test]
    fn test_normalize_guid_rejects_malformed() {
        assert!(normalize_guid("").is_none());
        assert!(normalize_guid("not-a-guid").is_none());
        // Wrong group length.
        assert!(normalize_guid("22fb2cd6-0e7b-422b-a0c7-2fad1fd0e71").is_none());
        // Non-hex character.
        assert!(normalize_guid("22fb2cdg-0e7b-422b-a0c7-2fad1fd0e716").is_none());
        // Unbalanced brace.
        assert!(normalize_guid("{22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716").is_none());
    }

    #[test]
    fn test_provider_config_validate_normalises() {
        let mut config = ProviderConfig::new("Kernel-Process", "{22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716}");
        config.validate().unwrap();
        assert_eq!(config.guid, "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716");

        let mut bad = ProviderConfig::new("x", "junk");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_trace_level_round_trip() {
        for level in TraceLevel::all() {
            assert_eq!(TraceLevel::from_u8(level.as_u8()), *level);
        }
        // Custom provider levels clamp to Verbose.
        assert_eq!(TraceLevel::from_u8(9), TraceLevel::Verbose);
    }

    #[test]
    fn test_event_row_summary_joins_properties() {
        let row = EventRow {
            id: 1,
            timestamp: Utc::now(),
            provider_name: "Test".into(),
            provider_guid: "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716".into(),
            event_id: 2,
            opcode: 0,
            level: TraceLevel::Information,
            process_id: 4,
            thread_id: 8,
            task: "ProcessStop".into(),
            properties: vec![
                ("ProcessID".into(), "1234".into()),
                ("ImageName".into(), "notepad.exe".into()),
            ],
        };
        assert_eq!(row.summary(), "ProcessID=1234  ImageName=notepad.exe");
    }
}
