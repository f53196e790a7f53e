//! Shared primitive IDs and pixel-layout enums.

use serde::{Deserialize, Serialize};

/// Monotonic image-session identifier.
pub type SessionId = u64;
/// Monotonic display-surface version, bumped on every successful materialize.
pub type SurfaceVersion = u64;

/// Channel layout of an image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Colorspace {
    /// Single gray channel.
    Luma,
    /// Gray plus alpha.
    LumaA,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
    /// Blue, green, red.
    Bgr,
    /// Blue, green, red, alpha.
    Bgra,
}

impl Colorspace {
    /// Number of interleaved channels per pixel.
    pub const fn components(self) -> usize {
        match self {
            Self::Luma => 1,
            Self::LumaA => 2,
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// True when the last channel is alpha.
    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::LumaA | Self::Rgba | Self::Bgra)
    }
}

/// Storage type of a single channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Depth {
    /// 8-bit unsigned.
    U8,
    /// 16-bit unsigned.
    U16,
    /// 32-bit float.
    F32,
}

impl Depth {
    /// Bytes occupied by one sample.
    pub const fn size_of(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F32 => 4,
        }
    }
}

/// Pixel layout a display surface expects from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelFormat {
    /// Interleaved 8-bit RGBA, unpremultiplied.
    #[default]
    Rgba8,
    /// Interleaved 8-bit BGRA, unpremultiplied.
    Bgra8,
}

impl PixelFormat {
    /// Colorspace the engine must convert to before writing.
    pub const fn colorspace(self) -> Colorspace {
        match self {
            Self::Rgba8 => Colorspace::Rgba,
            Self::Bgra8 => Colorspace::Bgra,
        }
    }

    /// Sample depth the engine must convert to before writing.
    pub const fn depth(self) -> Depth {
        Depth::U8
    }

    /// Bytes per interleaved pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        self.colorspace().components() * self.depth().size_of()
    }

    /// Byte size of one full frame of `width` x `height` pixels.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}
