// ETWSpy - ui/mod.rs
//
// Presentation layer: panels and theme. Panels render from `AppState` and
// communicate back through it; no panel talks to the trace layer directly.

pub mod panels;
pub mod theme;
