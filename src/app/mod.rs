// ETWSpy - app/mod.rs
//
// Application layer: shared state and session control.

pub mod state;
pub mod trace;
