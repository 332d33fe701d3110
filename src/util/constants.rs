// ETWSpy - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "ETWSpy";

/// Application identifier used for config/data directories and registry keys.
pub const APP_ID: &str = "ETWSpy";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Event pipeline limits
// =============================================================================

/// Capacity of the bounded queue between native callback threads and the UI.
/// Producers never block: once the queue is full, new events are dropped and
/// counted so the status bar can report the loss.
pub const EVENT_QUEUE_CAPACITY: usize = 10_000;

/// Smallest number of events drained from the queue per flush tick.
pub const MIN_FLUSH_BATCH: usize = 500;

/// Mid-sized flush batch, used once the queue is moderately backed up.
pub const MID_FLUSH_BATCH: usize = 1_000;

/// Largest number of events drained per flush tick, used when the queue is
/// deeply backed up. Capped so a single tick cannot stall the render loop.
pub const MAX_FLUSH_BATCH: usize = 2_000;

/// Queue depth at which the flush batch steps up from MIN to MID.
pub const BATCH_STEP_UP_DEPTH: usize = 2_000;

/// Queue depth at which the flush batch steps up from MID to MAX.
pub const BATCH_MAX_DEPTH: usize = 5_000;

/// Fastest flush cadence. Under sustained event pressure the controller
/// converges here to keep display latency low.
pub const MIN_FLUSH_INTERVAL_MS: u64 = 500;

/// Slowest flush cadence, used when the session is quiet so an idle trace
/// costs almost no CPU or repaint work.
pub const MAX_FLUSH_INTERVAL_MS: u64 = 4_000;

/// Default flush cadence at session start, before any depth samples exist.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1_000;

/// Number of queue-depth samples in the controller's sliding window.
pub const DEPTH_WINDOW_SAMPLES: usize = 5;

/// Windowed average depth above which the controller counts a "busy" sample.
pub const DEPTH_HIGH_THRESHOLD: usize = 2_500;

/// Windowed average depth below which the controller counts an "idle" sample.
pub const DEPTH_LOW_THRESHOLD: usize = 500;

/// Consecutive same-side samples required before the flush interval moves.
/// Hysteresis: a single burst or lull never changes the cadence on its own.
pub const HYSTERESIS_SAMPLES: u32 = 3;

// =============================================================================
// Display buffer limits
// =============================================================================

/// Default maximum number of events retained in the display buffer.
/// Oldest events are evicted FIFO once the cap is exceeded.
pub const DEFAULT_MAX_DISPLAY_EVENTS: usize = 10_000;

/// Minimum user-configurable display cap.
pub const MIN_MAX_DISPLAY_EVENTS: usize = 1_000;

/// Maximum user-configurable display cap. At roughly 1 KB per decoded row
/// this bounds display memory at ~100 MB.
pub const ABSOLUTE_MAX_DISPLAY_EVENTS: usize = 100_000;

// =============================================================================
// Session limits
// =============================================================================

/// Maximum number of providers that can be enabled on a single session.
pub const MAX_PROVIDERS_PER_SESSION: usize = 64;

/// Maximum number of filter entries kept in the filter set.
pub const MAX_FILTER_ENTRIES: usize = 256;

/// How long session stop waits for the background processing thread to
/// observe the closed session before abandoning the join (ms).
pub const SESSION_STOP_TIMEOUT_MS: u64 = 3_000;

/// ETW session name registered with the OS.
pub const SESSION_NAME: &str = "ETWSpy-Session";

// =============================================================================
// Event ID bounds
// =============================================================================

/// Highest valid ETW event ID (event IDs are 16-bit).
pub const MAX_EVENT_ID: u32 = 65_535;

// =============================================================================
// Catalog limits
// =============================================================================

/// Maximum number of providers loadable from a single catalog file.
/// Prevents a malformed multi-megabyte file from stalling the UI.
pub const MAX_CATALOG_ENTRIES: usize = 10_000;

// =============================================================================
// Configuration files
// =============================================================================

/// Primary configuration file extension.
pub const CONFIG_EXTENSION: &str = "etwspy";

/// Legacy configuration file extension, still accepted on load.
pub const CONFIG_EXTENSION_LEGACY: &str = "etwconfig";

/// Settings file name used on platforms without a registry.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

// =============================================================================
// Registry
// =============================================================================

/// Registry subkey under HKCU where persisted settings live.
pub const REGISTRY_SETTINGS_PATH: &str = r"Software\ETWSpy";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
