//! Image-engine integration.

/// Mapping from recorded operations to engine calls.
pub mod call;
/// Reference engine backed by the `image` crate.
pub mod raster;
/// Engine contract every image generation implements.
pub mod traits;
