// ETWSpy - core/catalog.rs
//
// Provider catalog: the name -> GUID directory used to resolve provider
// names typed by the user, plus CSV/JSON import and export of the list.
//
// CSV shape: one `Name,{GUID}` record per line, no header. JSON shape: an
// array of `{Name, Guid}` objects. Readers are lenient where real files
// vary (missing braces, key casing); writers always emit the canonical
// braced-uppercase form so exported files are stable.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::model::{braced_guid, normalize_guid};
use crate::util::constants::MAX_CATALOG_ENTRIES;
use crate::util::error::CatalogError;

/// One catalog row: a provider display name and its normalised GUID
/// (uppercase, no braces). Serializable because the user's custom list is
/// part of the persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub guid: String,
}

impl ProviderEntry {
    pub fn new(name: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: guid.into(),
        }
    }
}

/// Well-known providers shipped with the application so a fresh install can
/// resolve common names without importing a catalog first.
const BUILTIN_PROVIDERS: &[(&str, &str)] = &[
    ("Microsoft-Windows-Kernel-Process", "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716"),
    ("Microsoft-Windows-Kernel-File", "EDD08927-9CC4-4E65-B970-C2560FB5C289"),
    ("Microsoft-Windows-Kernel-Network", "7DD42A49-5329-4832-8DFD-43D979153A88"),
    ("Microsoft-Windows-Kernel-Registry", "70EB4F03-C1DE-4F73-A051-33D13D5413BD"),
    ("Microsoft-Windows-DNS-Client", "1C95126E-7EEA-49A9-A3FE-A378B03DDB4D"),
    ("Microsoft-Windows-PowerShell", "A0C1853B-5C40-4B15-8766-3CF1C58F985A"),
    ("Microsoft-Windows-TCPIP", "2F07E2EE-15DB-40F1-90EF-9D7BA282188A"),
    ("Microsoft-Windows-WinINet", "43D1A55C-76D6-4F7E-995C-64C711E5CAFE"),
    ("Microsoft-Windows-RPC", "6AD52B32-D609-4BE9-AE07-CE8DAE937E39"),
    ("Microsoft-Windows-Security-Auditing", "54849625-5478-4994-A5BA-3E3B0328C30D"),
    ("Microsoft-Windows-SMBClient", "988C59C5-0A1C-45B6-A555-0C62276E327D"),
    ("Microsoft-Windows-WMI-Activity", "1418EF04-B0B4-4623-BF7E-D74AB47BBDAA"),
];

/// The in-memory catalog: built-in entries followed by the user's custom
/// list. Resolution is case-insensitive on name and also accepts a GUID.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    entries: Vec<ProviderEntry>,
}

impl ProviderCatalog {
    /// Catalog holding only the built-in well-known providers.
    pub fn with_builtin() -> Self {
        let entries = BUILTIN_PROVIDERS
            .iter()
            .map(|(name, guid)| ProviderEntry::new(*name, *guid))
            .collect();
        Self { entries }
    }

    /// Append custom entries (e.g. the user's persisted list or an imported
    /// file). Entries whose GUID duplicates an existing one replace nothing;
    /// the first occurrence wins on resolution, so built-ins stay stable.
    pub fn extend(&mut self, custom: impl IntoIterator<Item = ProviderEntry>) {
        self.entries.extend(custom);
    }

    pub fn entries(&self) -> &[ProviderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve user input to a catalog entry. Accepts a provider name
    /// (case-insensitive) or a GUID with or without braces.
    pub fn resolve(&self, input: &str) -> Option<&ProviderEntry> {
        let input = input.trim();
        if let Some(guid) = normalize_guid(input) {
            return self.entries.iter().find(|e| e.guid == guid);
        }
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(input))
    }

    /// Look up the display name for a GUID, for rendering rows from
    /// providers enabled by GUID alone.
    pub fn name_for_guid(&self, guid: &str) -> Option<&str> {
        let guid = normalize_guid(guid)?;
        self.entries
            .iter()
            .find(|e| e.guid == guid)
            .map(|e| e.name.as_str())
    }
}

// =============================================================================
// CSV import/export
// =============================================================================

/// Read a `Name,{GUID}` CSV catalog file, preserving file order.
pub fn read_csv(path: &Path) -> Result<Vec<ProviderEntry>, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut entries = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|source| CatalogError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 1);

        let (name, guid_raw) = match (record.get(0), record.get(1)) {
            (Some(name), Some(guid)) if !name.trim().is_empty() => {
                (name.trim().to_string(), guid.trim())
            }
            _ => {
                return Err(CatalogError::MalformedCsvRecord {
                    path: path.to_path_buf(),
                    line,
                })
            }
        };

        let guid = normalize_guid(guid_raw).ok_or_else(|| CatalogError::InvalidGuid {
            path: path.to_path_buf(),
            input: guid_raw.to_string(),
        })?;

        entries.push(ProviderEntry { name, guid });
        if entries.len() > MAX_CATALOG_ENTRIES {
            return Err(CatalogError::TooManyEntries {
                path: path.to_path_buf(),
                max: MAX_CATALOG_ENTRIES,
            });
        }
    }

    Ok(entries)
}

/// Write a catalog as `Name,{GUID}` CSV, in the given order.
pub fn write_csv(path: &Path, entries: &[ProviderEntry]) -> Result<(), CatalogError> {
    let file = File::create(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));

    for entry in entries {
        writer
            .write_record([entry.name.as_str(), braced_guid(&entry.guid).as_str()])
            .map_err(|source| CatalogError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
    }

    writer.flush().map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

// =============================================================================
// JSON import/export
// =============================================================================

/// Read a JSON catalog: an array of objects with `Name` and `Guid` keys.
/// Keys are matched case-insensitively and GUIDs may omit braces, since
/// files in the wild are produced by several tools.
pub fn read_json(path: &Path) -> Result<Vec<ProviderEntry>, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let doc: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CatalogError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let array = doc.as_array().ok_or_else(|| CatalogError::NotAnArray {
        path: path.to_path_buf(),
    })?;

    if array.len() > MAX_CATALOG_ENTRIES {
        return Err(CatalogError::TooManyEntries {
            path: path.to_path_buf(),
            max: MAX_CATALOG_ENTRIES,
        });
    }

    let mut entries = Vec::with_capacity(array.len());
    for (index, item) in array.iter().enumerate() {
        let name = string_key(item, "name").ok_or(CatalogError::MissingKey {
            path: path.to_path_buf(),
            index,
            key: "Name",
        })?;
        let guid_raw = string_key(item, "guid").ok_or(CatalogError::MissingKey {
            path: path.to_path_buf(),
            index,
            key: "Guid",
        })?;

        let guid = normalize_guid(&guid_raw).ok_or_else(|| CatalogError::InvalidGuid {
            path: path.to_path_buf(),
            input: guid_raw.clone(),
        })?;

        entries.push(ProviderEntry { name, guid });
    }

    Ok(entries)
}

/// Write a catalog as a JSON array of `{Name, Guid}` objects (pretty-printed,
/// GUIDs braced).
pub fn write_json(path: &Path, entries: &[ProviderEntry]) -> Result<(), CatalogError> {
    let array: Vec<Value> = entries
        .iter()
        .map(|e| {
            serde_json::json!({
                "Name": e.name,
                "Guid": braced_guid(&e.guid),
            })
        })
        .collect();

    let file = File::create(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::to_writer_pretty(BufWriter::new(file), &Value::Array(array)).map_err(|source| {
        CatalogError::Json {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Pick the reader by file extension: `.json` is JSON, anything else CSV.
pub fn read_file(path: &Path) -> Result<Vec<ProviderEntry>, CatalogError> {
    if has_json_extension(path) {
        read_json(path)
    } else {
        read_csv(path)
    }
}

/// Pick the writer by file extension, mirroring `read_file`.
pub fn write_file(path: &Path, entries: &[ProviderEntry]) -> Result<(), CatalogError> {
    if has_json_extension(path) {
        write_json(path, entries)
    } else {
        write_csv(path, entries)
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Fetch a string value by key, matching the key case-insensitively.
fn string_key(item: &Value, wanted: &str) -> Option<String> {
    let object = item.as_object()?;
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
        .and_then(|(_, value)| value.as_str())
        .map(str::to_string)
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_resolves_by_name_case_insensitively() {
        let catalog = ProviderCatalog::with_builtin();
        let entry = catalog
            .resolve("microsoft-windows-kernel-process")
            .expect("builtin provider should resolve");
        assert_eq!(entry.guid, "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716");
    }

    #[test]
    fn test_catalog_resolves_by_guid_with_or_without_braces() {
        let catalog = ProviderCatalog::with_builtin();
        let braced = catalog.resolve("{22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716}");
        let bare = catalog.resolve("22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716");
        assert!(braced.is_some());
        assert_eq!(braced.map(|e| &e.name), bare.map(|e| &e.name));
    }

    #[test]
    fn test_unknown_name_does_not_resolve() {
        let catalog = ProviderCatalog::with_builtin();
        assert!(catalog.resolve("No-Such-Provider").is_none());
    }

    #[test]
    fn test_custom_entries_extend_catalog() {
        let mut catalog = ProviderCatalog::with_builtin();
        let before = catalog.len();
        catalog.extend([ProviderEntry::new(
            "MyApp-Tracing",
            "11111111-2222-3333-4444-555555555555",
        )]);
        assert_eq!(catalog.len(), before + 1);
        assert!(catalog.resolve("MyApp-Tracing").is_some());
    }

    #[test]
    fn test_name_for_guid() {
        let catalog = ProviderCatalog::with_builtin();
        assert_eq!(
            catalog.name_for_guid("{1C95126E-7EEA-49A9-A3FE-A378B03DDB4D}"),
            Some("Microsoft-Windows-DNS-Client")
        );
        assert_eq!(
            catalog.name_for_guid("99999999-9999-9999-9999-999999999999"),
            None
        );
    }

    #[test]
    fn test_string_key_is_case_insensitive() {
        let item = serde_json::json!({"NAME": "A", "guid": "B"});
        assert_eq!(string_key(&item, "name").as_deref(), Some("A"));
        assert_eq!(string_key(&item, "Guid").as_deref(), Some("B"));
        assert_eq!(string_key(&item, "other"), None);
    }
}
