// ETWSpy - core/filter.rs
//
// Display-side filter engine for decoded events.
// Core layer: pure logic, no I/O or UI dependencies.
//
// Semantics: exclude entries always veto a matching event. Include entries
// OR-combine within a category; categories AND-combine. A provider-scoped
// entry only ever applies to events from that provider, so an include filter
// written for provider A never hides provider B's events.

use std::collections::BTreeSet;

use crate::core::event_ids;
use crate::core::model::{EventRow, FilterCategory, FilterEntry};
use crate::util::constants::MAX_FILTER_ENTRIES;
use crate::util::error::ValidationError;

/// The value of one filter entry, validated and pre-compiled at add time so
/// per-event evaluation never re-parses strings.
#[derive(Debug, Clone)]
enum CompiledValue {
    EventIds(BTreeSet<u16>),
    ProcessId(u32),
    Substring(String),
}

#[derive(Debug, Clone)]
struct CompiledEntry {
    entry: FilterEntry,
    value: CompiledValue,
}

/// An ordered set of filter entries with duplicate rejection.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    compiled: Vec<CompiledEntry>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// The raw entries, in insertion order (for display and persistence).
    pub fn entries(&self) -> impl Iterator<Item = &FilterEntry> {
        self.compiled.iter().map(|c| &c.entry)
    }

    /// Add an entry, validating its value and rejecting exact duplicates.
    pub fn add(&mut self, entry: FilterEntry) -> Result<(), ValidationError> {
        if self.compiled.iter().any(|c| c.entry == entry) {
            return Err(ValidationError::DuplicateFilter {
                description: entry.describe(),
            });
        }
        if self.compiled.len() >= MAX_FILTER_ENTRIES {
            return Err(ValidationError::TooManyFilters {
                count: self.compiled.len() + 1,
                max: MAX_FILTER_ENTRIES,
            });
        }

        let value = compile_value(&entry)?;
        self.compiled.push(CompiledEntry { entry, value });
        Ok(())
    }

    /// Remove the entry at `index`. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) {
        if index < self.compiled.len() {
            self.compiled.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.compiled.clear();
    }

    /// Decide whether `row` passes the filter set.
    pub fn allows(&self, row: &EventRow) -> bool {
        // Excludes veto first.
        for c in &self.compiled {
            if !c.entry.include && applies_to(&c.entry, row) && matches(&c.value, row) {
                return false;
            }
        }

        // Includes: for every category with at least one entry covering this
        // event's provider, the event must match one of them.
        for category in FilterCategory::all() {
            let mut covered = false;
            let mut matched = false;
            for c in &self.compiled {
                if c.entry.include
                    && c.entry.category == *category
                    && applies_to(&c.entry, row)
                {
                    covered = true;
                    if matches(&c.value, row) {
                        matched = true;
                        break;
                    }
                }
            }
            if covered && !matched {
                return false;
            }
        }

        true
    }
}

/// True when the entry's provider scope covers this event.
fn applies_to(entry: &FilterEntry, row: &EventRow) -> bool {
    if entry.provider.is_empty() {
        return true;
    }
    entry.provider.eq_ignore_ascii_case(&row.provider_name)
        || entry.provider.eq_ignore_ascii_case(&row.provider_guid)
}

fn matches(value: &CompiledValue, row: &EventRow) -> bool {
    match value {
        CompiledValue::EventIds(ids) => ids.contains(&row.event_id),
        CompiledValue::ProcessId(pid) => row.process_id == *pid,
        CompiledValue::Substring(needle) => match_substring(needle, row),
    }
}

fn match_substring(needle: &str, row: &EventRow) -> bool {
    // needle is already lowercased by compile_value.
    row.task.to_lowercase().contains(needle)
        || row
            .properties
            .iter()
            .any(|(_, v)| v.to_lowercase().contains(needle))
}

fn compile_value(entry: &FilterEntry) -> Result<CompiledValue, ValidationError> {
    match entry.category {
        FilterCategory::EventId => {
            let ids = event_ids::parse_event_ids(&entry.value)?;
            Ok(CompiledValue::EventIds(ids))
        }
        FilterCategory::ProcessId => {
            let pid: u32 =
                entry
                    .value
                    .trim()
                    .parse()
                    .map_err(|_| ValidationError::MalformedProcessId {
                        value: entry.value.clone(),
                    })?;
            Ok(CompiledValue::ProcessId(pid))
        }
        FilterCategory::TaskName | FilterCategory::Payload => {
            Ok(CompiledValue::Substring(entry.value.to_lowercase()))
        }
    }
}

// =============================================================================
// Unit tests
// =============================================================================
