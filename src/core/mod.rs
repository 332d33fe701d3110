// ETWSpy - core/mod.rs
//
// Platform-independent core: data model, parsing, filtering, catalog and
// config file formats, and the event pipeline. Nothing in this tree touches
// ETW, the registry, or the UI, so all of it is testable off-Windows.

pub mod catalog;
pub mod config_file;
pub mod event_ids;
pub mod filter;
pub mod model;
pub mod pipeline;
