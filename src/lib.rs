// ETWSpy - lib.rs
//
// Library root. The binary in main.rs drives the GUI; the library layout
// keeps core logic importable by the integration tests.

pub mod app;
pub mod core;
pub mod gui;
pub mod platform;
pub mod ui;
pub mod util;
