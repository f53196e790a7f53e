//! Moving pixels from the image engine onto a display surface.

use std::fmt;

use crate::engine::traits::EngineError;

/// Engine-to-surface copy with size checks.
pub mod handoff;
/// Shared intermediate byte buffer.
pub mod scratch;
/// Renderer-visible pixel store.
pub mod surface;

#[derive(Debug)]
pub enum RenderError {
    Engine(EngineError),
    /// The generation's byte size disagrees with its declared dimensions.
    SizeMismatch { expected: usize, actual: usize },
}

impl From<EngineError> for RenderError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(err) => write!(f, "{err}"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "frame is {actual} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for RenderError {}
