// ETWSpy - tests/file_formats.rs
//
// Integration tests for the on-disk formats: provider catalogs (CSV and
// JSON) and `.etwspy` configuration files.

use std::fs;

use etwspy::core::catalog::{self, ProviderEntry};
use etwspy::core::config_file::{self, SessionConfig};
use etwspy::core::model::{FilterCategory, FilterEntry, ProviderConfig, TraceLevel};
use etwspy::util::error::{CatalogError, ConfigError};

fn sample_entries() -> Vec<ProviderEntry> {
    vec![
        ProviderEntry::new(
            "Microsoft-Windows-Kernel-Process",
            "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716",
        ),
        ProviderEntry::new(
            "Microsoft-Windows-DNS-Client",
            "1C95126E-7EEA-49A9-A3FE-A378B03DDB4D",
        ),
        ProviderEntry::new("MyApp-Tracing", "11111111-2222-3333-4444-555555555555"),
    ]
}

// ---------------------------------------------------------------------------
// CSV catalog
// ---------------------------------------------------------------------------

#[test]
fn csv_round_trip_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.csv");

    let entries = sample_entries();
    catalog::write_csv(&path, &entries).unwrap();
    let loaded = catalog::read_csv(&path).unwrap();

    assert_eq!(loaded, entries);
}

#[test]
fn csv_writes_braced_guids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.csv");

    catalog::write_csv(&path, &sample_entries()).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("{22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716}"));
}

#[test]
fn csv_read_tolerates_missing_braces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.csv");

    fs::write(
        &path,
        "Alpha,22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716\nBeta,{1C95126E-7EEA-49A9-A3FE-A378B03DDB4D}\n",
    )
    .unwrap();

    let loaded = catalog::read_csv(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].guid, "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716");
    assert_eq!(loaded[1].name, "Beta");
}

#[test]
fn csv_read_rejects_bad_guid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.csv");
    fs::write(&path, "Alpha,not-a-guid\n").unwrap();

    assert!(matches!(
        catalog::read_csv(&path).unwrap_err(),
        CatalogError::InvalidGuid { .. }
    ));
}

#[test]
fn csv_read_rejects_short_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.csv");
    fs::write(&path, "JustAName\n").unwrap();

    assert!(matches!(
        catalog::read_csv(&path).unwrap_err(),
        CatalogError::MalformedCsvRecord { .. }
    ));
}

// ---------------------------------------------------------------------------
// JSON catalog
// ---------------------------------------------------------------------------

#[test]
fn json_round_trip_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.json");

    let entries = sample_entries();
    catalog::write_json(&path, &entries).unwrap();
    let loaded = catalog::read_json(&path).unwrap();

    assert_eq!(loaded, entries);
}

#[test]
fn json_read_accepts_any_key_casing_and_bare_guids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.json");

    fs::write(
        &path,
        r#"[
            {"name": "Alpha", "GUID": "22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716"},
            {"NAME": "Beta", "guid": "{1C95126E-7EEA-49A9-A3FE-A378B03DDB4D}"}
        ]"#,
    )
    .unwrap();

    let loaded = catalog::read_json(&path).unwrap();
    assert_eq!(loaded[0].name, "Alpha");
    assert_eq!(loaded[0].guid, "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716");
    assert_eq!(loaded[1].guid, "1C95126E-7EEA-49A9-A3FE-A378B03DDB4D");
}

#[test]
fn json_read_rejects_non_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.json");
    fs::write(&path, r#"{"Name": "Alpha"}"#).unwrap();

    assert!(matches!(
        catalog::read_json(&path).unwrap_err(),
        CatalogError::NotAnArray { .. }
    ));
}

#[test]
fn json_read_reports_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.json");
    fs::write(&path, r#"[{"Name": "Alpha"}]"#).unwrap();

    match catalog::read_json(&path).unwrap_err() {
        CatalogError::MissingKey { index, key, .. } => {
            assert_eq!(index, 0);
            assert_eq!(key, "Guid");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn read_file_dispatches_on_extension() {
    let dir = tempfile::tempdir().unwrap();
    let entries = sample_entries();

    let csv_path = dir.path().join("providers.csv");
    let json_path = dir.path().join("providers.json");
    catalog::write_file(&csv_path, &entries).unwrap();
    catalog::write_file(&json_path, &entries).unwrap();

    assert_eq!(catalog::read_file(&csv_path).unwrap(), entries);
    assert_eq!(catalog::read_file(&json_path).unwrap(), entries);
}

// ---------------------------------------------------------------------------
// Configuration files
// ---------------------------------------------------------------------------

fn sample_config() -> SessionConfig {
    let mut provider = ProviderConfig::new(
        "Microsoft-Windows-Kernel-Process",
        "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716",
    );
    provider.keywords_any = 0x50;
    provider.level = TraceLevel::Warning;
    provider.event_ids = [1u16, 2, 3, 5].into_iter().collect();

    let filters = vec![
        FilterEntry {
            provider: String::new(),
            category: FilterCategory::EventId,
            value: "1-3".to_string(),
            include: true,
        },
        FilterEntry {
            provider: "Microsoft-Windows-Kernel-Process".to_string(),
            category: FilterCategory::Payload,
            value: "notepad".to_string(),
            include: false,
        },
    ];

    SessionConfig::new(vec![provider], filters)
}

#[test]
fn config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.etwspy");

    let original = sample_config();
    config_file::save(&path, &original).unwrap();
    let loaded = config_file::load(&path).unwrap();

    assert_eq!(loaded.version, original.version);
    assert_eq!(loaded.providers, original.providers);
    assert_eq!(loaded.filters, original.filters);
}

#[test]
fn config_load_accepts_legacy_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.etwconfig");

    config_file::save(&path, &sample_config()).unwrap();
    assert_eq!(config_file::load(&path).unwrap().providers.len(), 1);
}

#[test]
fn config_load_normalises_provider_guids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.etwspy");

    fs::write(
        &path,
        r#"{
            "version": 1,
            "providers": [{"guid": "{22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716}"}],
            "filters": []
        }"#,
    )
    .unwrap();

    let loaded = config_file::load(&path).unwrap();
    assert_eq!(
        loaded.providers[0].guid,
        "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716"
    );
}

#[test]
fn config_load_rejects_newer_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.etwspy");
    fs::write(&path, r#"{"version": 99, "providers": [], "filters": []}"#).unwrap();

    assert!(matches!(
        config_file::load(&path).unwrap_err(),
        ConfigError::UnsupportedVersion { found: 99, .. }
    ));
}

#[test]
fn config_load_rejects_invalid_guid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.etwspy");
    fs::write(
        &path,
        r#"{"version": 1, "providers": [{"guid": "bogus"}], "filters": []}"#,
    )
    .unwrap();

    assert!(matches!(
        config_file::load(&path).unwrap_err(),
        ConfigError::InvalidEntry { .. }
    ));
}

#[test]
fn config_save_is_atomic_over_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.etwspy");

    config_file::save(&path, &sample_config()).unwrap();
    // Overwrite with an empty config; the temp file must be gone after.
    config_file::save(&path, &SessionConfig::default()).unwrap();

    assert!(config_file::load(&path).unwrap().providers.is_empty());
    assert!(!dir.path().join("session.tmp").exists());
}
