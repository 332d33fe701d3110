// ETWSpy - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation; all errors preserve the causal
// chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all ETWSpy operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum EtwSpyError {
    /// User input failed validation (GUIDs, event-id ranges, duplicates).
    Validation(ValidationError),

    /// Provider catalog file could not be read or written.
    Catalog(CatalogError),

    /// Configuration file loading or saving failed.
    Config(ConfigError),

    /// Trace session control failed.
    Session(SessionError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for EtwSpyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "Validation error: {e}"),
            Self::Catalog(e) => write!(f, "Catalog error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Session(e) => write!(f, "Session error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for EtwSpyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Catalog(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Session(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Errors produced by validating user input before it reaches a session.
///
/// These are surfaced synchronously in a modal dialog; the message text is
/// what the user reads, so each variant spells out what to fix.
#[derive(Debug)]
pub enum ValidationError {
    /// A GUID string is not of the 8-4-4-4-12 hex form.
    InvalidGuid { input: String },

    /// A provider name could not be resolved against the catalog.
    UnknownProvider { name: String },

    /// An event-id range has start > end (e.g. "5-1").
    InvertedRange { start: u32, end: u32 },

    /// An event id is outside [0, 65535].
    EventIdOutOfRange { value: u64 },

    /// A fragment of an event-id list is not numeric.
    MalformedEventId { fragment: String },

    /// A process-id filter value is not a decimal PID.
    MalformedProcessId { value: String },

    /// A keyword or flag mask is not a hexadecimal number of the right width.
    MalformedMask { input: String },

    /// A provider with identical fields is already configured.
    DuplicateProvider { name: String },

    /// A filter with identical fields already exists.
    DuplicateFilter { description: String },

    /// The session provider limit would be exceeded.
    TooManyProviders { count: usize, max: usize },

    /// The filter-entry limit would be exceeded.
    TooManyFilters { count: usize, max: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGuid { input } => {
                write!(
                    f,
                    "'{input}' is not a valid GUID. Expected hexadecimal \
                     8-4-4-4-12 form, with or without braces."
                )
            }
            Self::UnknownProvider { name } => {
                write!(
                    f,
                    "Provider '{name}' is not in the catalog. Enter its GUID \
                     directly or add it to the custom provider list."
                )
            }
            Self::InvertedRange { start, end } => {
                write!(f, "Event-id range {start}-{end} has start greater than end")
            }
            Self::EventIdOutOfRange { value } => {
                write!(f, "Event id {value} is out of range (0-65535)")
            }
            Self::MalformedEventId { fragment } => {
                write!(f, "'{fragment}' is not a valid event id or range")
            }
            Self::MalformedProcessId { value } => {
                write!(f, "'{value}' is not a valid process id")
            }
            Self::MalformedMask { input } => {
                write!(f, "'{input}' is not a valid hexadecimal mask")
            }
            Self::DuplicateProvider { name } => {
                write!(f, "Provider '{name}' is already configured")
            }
            Self::DuplicateFilter { description } => {
                write!(f, "An identical filter already exists: {description}")
            }
            Self::TooManyProviders { count, max } => {
                write!(f, "Cannot add provider #{count}: the limit is {max} per session")
            }
            Self::TooManyFilters { count, max } => {
                write!(f, "Cannot add filter #{count}: the limit is {max}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for EtwSpyError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Catalog errors
// ---------------------------------------------------------------------------

/// Errors related to provider catalog (CSV/JSON) files.
#[derive(Debug)]
pub enum CatalogError {
    /// A CSV record did not have the expected `Name,{GUID}` shape.
    MalformedCsvRecord { path: PathBuf, line: u64 },

    /// The JSON document is not an array of objects.
    NotAnArray { path: PathBuf },

    /// A JSON object is missing its Name or Guid key (any casing accepted).
    MissingKey {
        path: PathBuf,
        index: usize,
        key: &'static str,
    },

    /// A GUID in the file failed validation.
    InvalidGuid { path: PathBuf, input: String },

    /// The file holds more entries than MAX_CATALOG_ENTRIES.
    TooManyEntries { path: PathBuf, max: usize },

    /// CSV-level read/write failure.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON parse or serialise failure.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// I/O error reading or writing a catalog file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedCsvRecord { path, line } => {
                write!(
                    f,
                    "'{}' line {line}: expected 'Name,{{GUID}}'",
                    path.display()
                )
            }
            Self::NotAnArray { path } => {
                write!(
                    f,
                    "'{}': expected a JSON array of {{Name, Guid}} objects",
                    path.display()
                )
            }
            Self::MissingKey { path, index, key } => {
                write!(
                    f,
                    "'{}' entry {index}: missing '{key}' key",
                    path.display()
                )
            }
            Self::InvalidGuid { path, input } => {
                write!(f, "'{}': invalid GUID '{input}'", path.display())
            }
            Self::TooManyEntries { path, max } => {
                write!(
                    f,
                    "'{}' holds more than {max} providers; file rejected",
                    path.display()
                )
            }
            Self::Csv { path, source } => {
                write!(f, "CSV error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON error '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<CatalogError> for EtwSpyError {
    fn from(e: CatalogError) -> Self {
        Self::Catalog(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to `.etwspy` configuration files.
#[derive(Debug)]
pub enum ConfigError {
    /// JSON parsing failed.
    JsonParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The file's version stamp is newer than this binary understands.
    UnsupportedVersion { path: PathBuf, found: u32, max: u32 },

    /// A provider or filter entry inside the file failed validation.
    InvalidEntry {
        path: PathBuf,
        source: ValidationError,
    },

    /// I/O error reading or writing the config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JsonParse { path, source } => {
                write!(f, "Cannot parse '{}': {source}", path.display())
            }
            Self::UnsupportedVersion { path, found, max } => {
                write!(
                    f,
                    "'{}' is version {found}, but this build supports up to {max}. \
                     Update ETWSpy to open this file.",
                    path.display()
                )
            }
            Self::InvalidEntry { path, source } => {
                write!(f, "'{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::JsonParse { source, .. } => Some(source),
            Self::InvalidEntry { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for EtwSpyError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Errors related to ETW session control.
#[derive(Debug)]
pub enum SessionError {
    /// Session start was requested with no providers configured.
    NoProviders,

    /// A session is already running.
    AlreadyRunning,

    /// The native session could not be started.
    ///
    /// `sessions_exhausted` is set when the failure is Windows' concurrent
    /// ETW session limit (ERROR_NO_SYSTEM_RESOURCES); the UI uses it to
    /// offer remediation instead of a bare failure message.
    StartFailed {
        message: String,
        sessions_exhausted: bool,
    },

    /// The native session did not stop cleanly.
    StopFailed { message: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProviders => {
                write!(f, "No providers configured. Add at least one provider first.")
            }
            Self::AlreadyRunning => write!(f, "A trace session is already running"),
            Self::StartFailed {
                message,
                sessions_exhausted,
            } => {
                if *sessions_exhausted {
                    write!(
                        f,
                        "Windows has no free ETW session slots: {message}. \
                         Stop an existing trace session (e.g. with 'logman query -ets') and retry."
                    )
                } else {
                    write!(f, "Failed to start trace session: {message}")
                }
            }
            Self::StopFailed { message } => {
                write!(f, "Failed to stop trace session: {message}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SessionError> for EtwSpyError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

/// Convenience type alias for ETWSpy results.
pub type Result<T> = std::result::Result<T, EtwSpyError>;
