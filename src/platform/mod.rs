// ETWSpy - platform/mod.rs
//
// Platform integration: persisted settings and file association.

pub mod assoc;
pub mod settings;
