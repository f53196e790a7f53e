use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use tokio::sync::watch;

use crate::types::{PixelFormat, SurfaceVersion};

/// Pixels currently presented for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceFrame {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl SurfaceFrame {
    fn empty(format: PixelFormat) -> Self {
        Self {
            width: 0,
            height: 0,
            format,
            pixels: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Reallocates when the dimensions change. Returns true if it did.
    pub fn allocate(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        debug!("surface {}x{} -> {width}x{height}", self.width, self.height);
        self.width = width;
        self.height = height;
        self.pixels = vec![0; self.format.frame_size(width, height)];
        true
    }

    /// Copies a full frame in. Fails without touching the frame when the
    /// length does not match the allocation.
    pub fn install_pixels(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() != self.pixels.len() {
            return false;
        }
        self.pixels.copy_from_slice(bytes);
        true
    }
}

/// Renderer-visible pixel store with its own lock and a change counter.
#[derive(Debug)]
pub struct DisplaySurface {
    format: PixelFormat,
    frame: Mutex<SurfaceFrame>,
    version: watch::Sender<SurfaceVersion>,
}

impl DisplaySurface {
    pub fn new(format: PixelFormat) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            format,
            frame: Mutex::new(SurfaceFrame::empty(format)),
            version,
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Caller-side critical section over the frame.
    pub fn lock(&self) -> MutexGuard<'_, SurfaceFrame> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the frame without letting a writer in midway.
    pub fn read<R>(&self, f: impl FnOnce(&SurfaceFrame) -> R) -> R {
        f(&*self.lock())
    }

    pub fn snapshot(&self) -> SurfaceFrame {
        self.lock().clone()
    }

    pub fn version(&self) -> SurfaceVersion {
        *self.version.borrow()
    }

    /// Edge-triggered redraw signal.
    pub fn subscribe(&self) -> watch::Receiver<SurfaceVersion> {
        self.version.subscribe()
    }

    pub(crate) fn bump(&self) -> SurfaceVersion {
        self.version.send_modify(|v| *v += 1);
        self.version()
    }
}
