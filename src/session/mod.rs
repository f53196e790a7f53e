//! Per-file editing sessions and their registry.

/// Per-session mutual exclusion.
pub mod gate;
/// One open image: history, generations and display surface.
pub mod image;
/// Open sessions and the active tab.
pub mod registry;
