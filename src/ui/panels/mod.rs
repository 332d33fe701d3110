// ETWSpy - ui/panels/mod.rs

pub mod detail;
pub mod events;
pub mod filters;
pub mod providers;
