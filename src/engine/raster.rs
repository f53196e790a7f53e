use std::path::Path;

use image::{ColorType, DynamicImage, ImageBuffer, Rgba, Rgba32FImage, RgbaImage};
use log::trace;

use super::traits::{EngineError, EngineResult, Generation, LoadGeneration};
use crate::types::{Colorspace, Depth};

/// CPU image generation backed by [`image::DynamicImage`].
///
/// Filters run on an RGBA f32 working copy and are converted back to the
/// generation's own color type afterwards, so a failed filter leaves the
/// pixels untouched.
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
}

impl RasterImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Wraps interleaved RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> EngineResult<Self> {
        RgbaImage::from_raw(width, height, pixels)
            .map(|buf| Self::new(DynamicImage::ImageRgba8(buf)))
            .ok_or_else(|| {
                EngineError::InvalidParameter(format!("pixel count does not match {width}x{height}"))
            })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    fn with_rgba32f(
        &mut self,
        f: impl FnOnce(&Rgba32FImage) -> EngineResult<Rgba32FImage>,
    ) -> EngineResult<()> {
        let original = self.image.color();
        let work = self.image.to_rgba32f();
        let out = f(&work)?;
        self.image = convert(&DynamicImage::ImageRgba32F(out), original);
        Ok(())
    }

    fn map_rgb(&mut self, f: impl Fn(f32) -> f32) -> EngineResult<()> {
        self.with_rgba32f(|work| {
            let mut out = work.clone();
            for px in out.pixels_mut() {
                let [r, g, b, a] = px.0;
                px.0 = [f(r), f(g), f(b), a];
            }
            Ok(out)
        })
    }
}

fn layout(color: ColorType) -> (Colorspace, Depth) {
    match color {
        ColorType::L8 => (Colorspace::Luma, Depth::U8),
        ColorType::La8 => (Colorspace::LumaA, Depth::U8),
        ColorType::Rgb8 => (Colorspace::Rgb, Depth::U8),
        ColorType::Rgba8 => (Colorspace::Rgba, Depth::U8),
        ColorType::L16 => (Colorspace::Luma, Depth::U16),
        ColorType::La16 => (Colorspace::LumaA, Depth::U16),
        ColorType::Rgb16 => (Colorspace::Rgb, Depth::U16),
        ColorType::Rgba16 => (Colorspace::Rgba, Depth::U16),
        ColorType::Rgb32F => (Colorspace::Rgb, Depth::F32),
        _ => (Colorspace::Rgba, Depth::F32),
    }
}

fn color_type_for(colorspace: Colorspace, depth: Depth) -> Option<ColorType> {
    match (colorspace, depth) {
        (Colorspace::Luma, Depth::U8) => Some(ColorType::L8),
        (Colorspace::LumaA, Depth::U8) => Some(ColorType::La8),
        (Colorspace::Rgb, Depth::U8) => Some(ColorType::Rgb8),
        (Colorspace::Rgba, Depth::U8) => Some(ColorType::Rgba8),
        (Colorspace::Luma, Depth::U16) => Some(ColorType::L16),
        (Colorspace::LumaA, Depth::U16) => Some(ColorType::La16),
        (Colorspace::Rgb, Depth::U16) => Some(ColorType::Rgb16),
        (Colorspace::Rgba, Depth::U16) => Some(ColorType::Rgba16),
        (Colorspace::Rgb, Depth::F32) => Some(ColorType::Rgb32F),
        (Colorspace::Rgba, Depth::F32) => Some(ColorType::Rgba32F),
        _ => None,
    }
}

fn convert(image: &DynamicImage, to: ColorType) -> DynamicImage {
    match to {
        ColorType::L8 => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
        ColorType::Rgba8 => DynamicImage::ImageRgba8(image.to_rgba8()),
        ColorType::L16 => DynamicImage::ImageLuma16(image.to_luma16()),
        ColorType::La16 => DynamicImage::ImageLumaA16(image.to_luma_alpha16()),
        ColorType::Rgb16 => DynamicImage::ImageRgb16(image.to_rgb16()),
        ColorType::Rgba16 => DynamicImage::ImageRgba16(image.to_rgba16()),
        ColorType::Rgb32F => DynamicImage::ImageRgb32F(image.to_rgb32f()),
        _ => DynamicImage::ImageRgba32F(image.to_rgba32f()),
    }
}

/// Largest blur radius the windowed filters accept.
pub const MAX_RADIUS: u32 = 256;

fn check_radius(radius: u32) -> EngineResult<u32> {
    if radius > MAX_RADIUS {
        return Err(EngineError::InvalidParameter(format!(
            "blur radius {radius} exceeds {MAX_RADIUS}"
        )));
    }
    Ok(radius)
}

fn clamp_index(i: i64, len: u32) -> u32 {
    i.clamp(0, i64::from(len) - 1) as u32
}

fn box_blur_axis(src: &Rgba32FImage, radius: u32, horizontal: bool) -> Rgba32FImage {
    let (w, h) = src.dimensions();
    let r = i64::from(radius);
    let window = (2 * r + 1) as f32;
    ImageBuffer::from_fn(w, h, |x, y| {
        let mut acc = [0f32; 4];
        for k in -r..=r {
            let (sx, sy) = if horizontal {
                (clamp_index(i64::from(x) + k, w), y)
            } else {
                (x, clamp_index(i64::from(y) + k, h))
            };
            let p = src.get_pixel(sx, sy).0;
            for c in 0..4 {
                acc[c] += p[c];
            }
        }
        Rgba(acc.map(|v| v / window))
    })
}

fn median(src: &Rgba32FImage, radius: u32) -> Rgba32FImage {
    let (w, h) = src.dimensions();
    let r = i64::from(radius);
    let side = (2 * r + 1) as usize;
    let mut window: [Vec<f32>; 3] = std::array::from_fn(|_| Vec::with_capacity(side * side));
    ImageBuffer::from_fn(w, h, |x, y| {
        for channel in &mut window {
            channel.clear();
        }
        for dy in -r..=r {
            for dx in -r..=r {
                let p = src
                    .get_pixel(
                        clamp_index(i64::from(x) + dx, w),
                        clamp_index(i64::from(y) + dy, h),
                    )
                    .0;
                for c in 0..3 {
                    window[c].push(p[c]);
                }
            }
        }
        let mut out = src.get_pixel(x, y).0;
        for c in 0..3 {
            window[c].sort_by(f32::total_cmp);
            out[c] = window[c][window[c].len() / 2];
        }
        Rgba(out)
    })
}

fn bilateral(src: &Rgba32FImage, radius: u32) -> Rgba32FImage {
    const SIGMA_COLOR: f32 = 0.1;
    let (w, h) = src.dimensions();
    let r = i64::from(radius);
    let sigma_space = radius as f32;
    ImageBuffer::from_fn(w, h, |x, y| {
        let center = src.get_pixel(x, y).0;
        let mut acc = [0f32; 3];
        let mut total = 0f32;
        for dy in -r..=r {
            for dx in -r..=r {
                let p = src
                    .get_pixel(
                        clamp_index(i64::from(x) + dx, w),
                        clamp_index(i64::from(y) + dy, h),
                    )
                    .0;
                let dist2 = (dx * dx + dy * dy) as f32;
                let color2: f32 = (0..3).map(|c| (p[c] - center[c]).powi(2)).sum();
                let weight = (-dist2 / (2.0 * sigma_space * sigma_space)
                    - color2 / (2.0 * SIGMA_COLOR * SIGMA_COLOR))
                    .exp();
                for c in 0..3 {
                    acc[c] += p[c] * weight;
                }
                total += weight;
            }
        }
        Rgba([acc[0] / total, acc[1] / total, acc[2] / total, center[3]])
    })
}

fn sobel(src: &Rgba32FImage) -> Rgba32FImage {
    let (w, h) = src.dimensions();
    let luma = |x: i64, y: i64| {
        let p = src.get_pixel(clamp_index(x, w), clamp_index(y, h)).0;
        0.299 * p[0] + 0.587 * p[1] + 0.114 * p[2]
    };
    ImageBuffer::from_fn(w, h, |x, y| {
        let (x, y) = (i64::from(x), i64::from(y));
        let gx = -luma(x - 1, y - 1) - 2.0 * luma(x - 1, y) - luma(x - 1, y + 1)
            + luma(x + 1, y - 1)
            + 2.0 * luma(x + 1, y)
            + luma(x + 1, y + 1);
        let gy = -luma(x - 1, y - 1) - 2.0 * luma(x, y - 1) - luma(x + 1, y - 1)
            + luma(x - 1, y + 1)
            + 2.0 * luma(x, y + 1)
            + luma(x + 1, y + 1);
        let mag = (gx * gx + gy * gy).sqrt().min(1.0);
        let alpha = src.get_pixel(x as u32, y as u32).0[3];
        Rgba([mag, mag, mag, alpha])
    })
}

fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d <= f32::EPSILON {
        return (0.0, 0.0, l);
    }
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h * 60.0, s, l)
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s <= f32::EPSILON {
        return (l, l, l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f32| {
        t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    let h = h / 360.0;
    (hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0))
}

impl Generation for RasterImage {
    fn fork(&self) -> EngineResult<Self> {
        Ok(self.clone())
    }

    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn colorspace(&self) -> Colorspace {
        layout(self.image.color()).0
    }

    fn depth(&self) -> Depth {
        layout(self.image.color()).1
    }

    fn convert_colorspace(&mut self, to: Colorspace) -> EngineResult<()> {
        let target = color_type_for(to, self.depth())
            .ok_or_else(|| EngineError::Unsupported(format!("{to:?} at {:?}", self.depth())))?;
        if target != self.image.color() {
            self.image = convert(&self.image, target);
        }
        Ok(())
    }

    fn convert_depth(&mut self, to: Depth) -> EngineResult<()> {
        let target = color_type_for(self.colorspace(), to)
            .ok_or_else(|| EngineError::Unsupported(format!("{:?} at {to:?}", self.colorspace())))?;
        if target != self.image.color() {
            self.image = convert(&self.image, target);
        }
        Ok(())
    }

    fn brighten(&mut self, delta: f32) -> EngineResult<()> {
        self.map_rgb(|c| c + delta)
    }

    fn contrast(&mut self, delta: f32) -> EngineResult<()> {
        self.image = self.image.adjust_contrast(delta);
        Ok(())
    }

    fn exposure(&mut self, exposure: f32, black_point: f32) -> EngineResult<()> {
        self.map_rgb(|c| (c - black_point) * exposure)
    }

    fn stretch_contrast(&mut self, lower: f32, upper: f32) -> EngineResult<()> {
        if upper <= lower {
            return Err(EngineError::InvalidParameter(format!(
                "levels range {lower}..{upper} is empty"
            )));
        }
        self.map_rgb(|c| ((c * 256.0 - lower) / (upper - lower)).clamp(0.0, 1.0))
    }

    fn box_blur(&mut self, radius: u32) -> EngineResult<()> {
        if check_radius(radius)? == 0 {
            return Ok(());
        }
        self.with_rgba32f(|work| {
            let pass = box_blur_axis(work, radius, true);
            Ok(box_blur_axis(&pass, radius, false))
        })
    }

    fn gaussian_blur(&mut self, radius: u32) -> EngineResult<()> {
        if check_radius(radius)? > 0 {
            self.image = self.image.blur(radius as f32);
        }
        Ok(())
    }

    fn median_blur(&mut self, radius: u32) -> EngineResult<()> {
        if check_radius(radius)? == 0 {
            return Ok(());
        }
        self.with_rgba32f(|work| Ok(median(work, radius)))
    }

    fn bilateral_blur(&mut self, radius: u32) -> EngineResult<()> {
        if check_radius(radius)? == 0 {
            return Ok(());
        }
        self.with_rgba32f(|work| Ok(bilateral(work, radius)))
    }

    fn hsl_adjust(&mut self, hue: f32, saturation: f32, lightness: f32) -> EngineResult<()> {
        self.with_rgba32f(|work| {
            let mut out = work.clone();
            for px in out.pixels_mut() {
                let [r, g, b, a] = px.0;
                let (h, s, l) = rgb_to_hsl(r, g, b);
                let (r, g, b) = hsl_to_rgb(
                    (h + hue).rem_euclid(360.0),
                    (s * saturation).clamp(0.0, 1.0),
                    (l * lightness).clamp(0.0, 1.0),
                );
                px.0 = [r, g, b, a];
            }
            Ok(out)
        })
    }

    fn color_matrix(&mut self, matrix: &[f32]) -> EngineResult<()> {
        let m: &[f32; 20] = matrix.try_into().map_err(|_| {
            EngineError::InvalidParameter(format!("color matrix needs 20 entries, got {}", matrix.len()))
        })?;
        self.with_rgba32f(|work| {
            let mut out = work.clone();
            for px in out.pixels_mut() {
                let src = px.0;
                px.0 = std::array::from_fn(|row| {
                    let k = &m[row * 5..row * 5 + 5];
                    k[0] * src[0] + k[1] * src[1] + k[2] * src[2] + k[3] * src[3] + k[4] / 255.0
                });
            }
            Ok(out)
        })
    }

    fn edges(&mut self) -> EngineResult<()> {
        self.with_rgba32f(|work| Ok(sobel(work)))
    }

    fn vertical_flip(&mut self) -> EngineResult<()> {
        self.image = self.image.flipv();
        Ok(())
    }

    fn horizontal_flip(&mut self) -> EngineResult<()> {
        self.image = self.image.fliph();
        Ok(())
    }

    fn transpose(&mut self) -> EngineResult<()> {
        self.image = self.image.rotate90().fliph();
        Ok(())
    }

    fn rotate180(&mut self) -> EngineResult<()> {
        self.image = self.image.rotate180();
        Ok(())
    }

    fn output_buffer_size(&self) -> usize {
        self.image.as_bytes().len()
    }

    fn write_to_buffer(&self, out: &mut [u8]) -> EngineResult<usize> {
        let bytes = self.image.as_bytes();
        let available = out.len();
        let dst = out.get_mut(..bytes.len()).ok_or(EngineError::BufferTooSmall {
            needed: bytes.len(),
            available,
        })?;
        dst.copy_from_slice(bytes);
        Ok(bytes.len())
    }

    fn release(&mut self) {
        trace!("releasing {}x{} raster", self.image.width(), self.image.height());
        self.image = DynamicImage::new_rgba8(0, 0);
    }
}

impl LoadGeneration for RasterImage {
    fn load(path: &Path) -> EngineResult<Self> {
        image::open(path)
            .map(Self::new)
            .map_err(|err| EngineError::Decode(format!("{}: {err}", path.display())))
    }
}
