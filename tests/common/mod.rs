#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use pixledit::{
    engine::traits::{EngineError, EngineResult, Generation},
    types::{Colorspace, Depth},
};

/// Shared record of what every fork of a [`FakeImage`] was asked to do.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<&'static str>>,
    released: AtomicUsize,
    size_skew: AtomicUsize,
    fail_on: Mutex<Option<&'static str>>,
    panic_on: Mutex<Option<&'static str>>,
    delay_ms: AtomicU64,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| **call == name).count()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Makes `output_buffer_size` lie by `bytes`.
    pub fn skew_size(&self, bytes: usize) {
        self.size_skew.store(bytes, Ordering::SeqCst);
    }

    pub fn fail_on(&self, call: Option<&'static str>) {
        *self.fail_on.lock().expect("fail_on") = call;
    }

    pub fn panic_on(&self, call: Option<&'static str>) {
        *self.panic_on.lock().expect("panic_on") = call;
    }

    /// Every logged call sleeps this long after it is recorded.
    pub fn slow_down(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

/// RGBA8 test generation that logs engine calls and implements the
/// geometric ones for real.
#[derive(Debug)]
pub struct FakeImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    log: Arc<CallLog>,
}

impl FakeImage {
    pub fn new(width: u32, height: u32, log: &Arc<CallLog>) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            pixels: (0..len).map(|i| (i % 251) as u8).collect(),
            log: Arc::clone(log),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn record(&self, call: &'static str) -> EngineResult<()> {
        if *self.log.fail_on.lock().expect("fail_on") == Some(call) {
            return Err(EngineError::InvalidParameter(format!("{call} rigged to fail")));
        }
        self.log.calls.lock().expect("calls").push(call);
        if *self.log.panic_on.lock().expect("panic_on") == Some(call) {
            panic!("{call} rigged to panic");
        }
        let delay = self.log.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        Ok(())
    }

    fn row_len(&self) -> usize {
        self.width as usize * 4
    }
}

impl Generation for FakeImage {
    fn fork(&self) -> EngineResult<Self> {
        Ok(Self {
            width: self.width,
            height: self.height,
            pixels: self.pixels.clone(),
            log: Arc::clone(&self.log),
        })
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn colorspace(&self) -> Colorspace {
        Colorspace::Rgba
    }

    fn depth(&self) -> Depth {
        Depth::U8
    }

    fn convert_colorspace(&mut self, _to: Colorspace) -> EngineResult<()> {
        Ok(())
    }

    fn convert_depth(&mut self, _to: Depth) -> EngineResult<()> {
        Ok(())
    }

    fn brighten(&mut self, delta: f32) -> EngineResult<()> {
        self.record("brighten")?;
        let step = (delta * 100.0).round() as i16;
        for px in &mut self.pixels {
            *px = (i16::from(*px) + step).clamp(0, 255) as u8;
        }
        Ok(())
    }

    fn contrast(&mut self, _delta: f32) -> EngineResult<()> {
        self.record("contrast")
    }

    fn exposure(&mut self, _exposure: f32, _black_point: f32) -> EngineResult<()> {
        self.record("exposure")
    }

    fn stretch_contrast(&mut self, _lower: f32, _upper: f32) -> EngineResult<()> {
        self.record("stretch_contrast")
    }

    fn box_blur(&mut self, _radius: u32) -> EngineResult<()> {
        self.record("box_blur")
    }

    fn gaussian_blur(&mut self, _radius: u32) -> EngineResult<()> {
        self.record("gaussian_blur")
    }

    fn median_blur(&mut self, _radius: u32) -> EngineResult<()> {
        self.record("median_blur")
    }

    fn bilateral_blur(&mut self, _radius: u32) -> EngineResult<()> {
        self.record("bilateral_blur")
    }

    fn hsl_adjust(&mut self, _hue: f32, _saturation: f32, _lightness: f32) -> EngineResult<()> {
        self.record("hsl_adjust")
    }

    fn color_matrix(&mut self, _matrix: &[f32]) -> EngineResult<()> {
        self.record("color_matrix")
    }

    fn edges(&mut self) -> EngineResult<()> {
        self.record("edges")
    }

    fn vertical_flip(&mut self) -> EngineResult<()> {
        self.record("vertical_flip")?;
        let row = self.row_len();
        self.pixels = self.pixels.chunks(row).rev().flatten().copied().collect();
        Ok(())
    }

    fn horizontal_flip(&mut self) -> EngineResult<()> {
        self.record("horizontal_flip")?;
        let row = self.row_len();
        self.pixels = self
            .pixels
            .chunks(row)
            .flat_map(|r| r.chunks(4).rev().flatten().copied())
            .collect();
        Ok(())
    }

    fn transpose(&mut self) -> EngineResult<()> {
        self.record("transpose")?;
        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = vec![0; self.pixels.len()];
        for y in 0..h {
            for x in 0..w {
                let src = (y * w + x) * 4;
                let dst = (x * h + y) * 4;
                out[dst..dst + 4].copy_from_slice(&self.pixels[src..src + 4]);
            }
        }
        self.pixels = out;
        std::mem::swap(&mut self.width, &mut self.height);
        Ok(())
    }

    fn rotate180(&mut self) -> EngineResult<()> {
        self.record("rotate180")?;
        self.pixels = self.pixels.chunks(4).rev().flatten().copied().collect();
        Ok(())
    }

    fn output_buffer_size(&self) -> usize {
        self.pixels.len() + self.log.size_skew.load(Ordering::SeqCst)
    }

    fn write_to_buffer(&self, out: &mut [u8]) -> EngineResult<usize> {
        let len = self.pixels.len();
        if out.len() < len {
            return Err(EngineError::BufferTooSmall {
                needed: len,
                available: out.len(),
            });
        }
        out[..len].copy_from_slice(&self.pixels);
        Ok(len)
    }

    fn release(&mut self) {
        self.log.released.fetch_add(1, Ordering::SeqCst);
    }
}
