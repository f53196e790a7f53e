use std::{fmt, path::Path};

use crate::types::{Colorspace, Depth};

#[derive(Debug)]
pub enum EngineError {
    Unsupported(String),
    InvalidParameter(String),
    Decode(String),
    BufferTooSmall { needed: usize, available: usize },
    /// The engine panicked mid-call.
    Panicked(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(what) => write!(f, "unsupported: {what}"),
            Self::InvalidParameter(what) => write!(f, "invalid parameter: {what}"),
            Self::Decode(msg) => write!(f, "cannot load image: {msg}"),
            Self::BufferTooSmall { needed, available } => {
                write!(f, "output buffer holds {available} bytes, {needed} needed")
            }
            Self::Panicked(msg) => write!(f, "engine panicked: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

/// One independently mutable version of an image, as provided by the image
/// engine.
///
/// Calls are synchronous and may be slow. A handle is never used from two
/// threads at once; the session's operation gate guarantees that.
pub trait Generation: Send + 'static {
    /// Returns an independently owned copy.
    fn fork(&self) -> EngineResult<Self>
    where
        Self: Sized;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn colorspace(&self) -> Colorspace;
    fn depth(&self) -> Depth;

    fn convert_colorspace(&mut self, to: Colorspace) -> EngineResult<()>;
    fn convert_depth(&mut self, to: Depth) -> EngineResult<()>;

    /// `delta` is in -1..=1.
    fn brighten(&mut self, delta: f32) -> EngineResult<()>;
    fn contrast(&mut self, delta: f32) -> EngineResult<()>;
    /// `(pixel - black_point) * exposure` on normalized samples.
    fn exposure(&mut self, exposure: f32, black_point: f32) -> EngineResult<()>;
    /// Maps `lower..upper` (0..=256 scale) onto the full sample range.
    fn stretch_contrast(&mut self, lower: f32, upper: f32) -> EngineResult<()>;
    fn box_blur(&mut self, radius: u32) -> EngineResult<()>;
    fn gaussian_blur(&mut self, radius: u32) -> EngineResult<()>;
    fn median_blur(&mut self, radius: u32) -> EngineResult<()>;
    fn bilateral_blur(&mut self, radius: u32) -> EngineResult<()>;
    /// Hue rotation in degrees; saturation and lightness are multipliers.
    fn hsl_adjust(&mut self, hue: f32, saturation: f32, lightness: f32) -> EngineResult<()>;
    /// Row-major 4x5 matrix over RGBA, offsets on the 0..=255 scale.
    fn color_matrix(&mut self, matrix: &[f32]) -> EngineResult<()>;
    fn edges(&mut self) -> EngineResult<()>;

    fn vertical_flip(&mut self) -> EngineResult<()>;
    fn horizontal_flip(&mut self) -> EngineResult<()>;
    fn transpose(&mut self) -> EngineResult<()>;
    fn rotate180(&mut self) -> EngineResult<()>;

    /// Minimum byte size [`Generation::write_to_buffer`] needs.
    fn output_buffer_size(&self) -> usize;

    /// Writes interleaved pixels in the current colorspace and depth.
    /// Returns the number of bytes written.
    fn write_to_buffer(&self, out: &mut [u8]) -> EngineResult<usize>;

    /// Frees engine-side resources. Called when the version store evicts
    /// this generation; the handle is dropped right after.
    fn release(&mut self) {}
}

/// Engines that can decode a file into a first generation.
pub trait LoadGeneration: Generation + Sized {
    fn load(path: &Path) -> EngineResult<Self>;
}
