use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

/// Intermediate byte region the engine writes a frame into before it is
/// installed on a surface.
///
/// One instance is shared by every session so peak memory stays at one frame
/// of the largest open image. It grows on demand and never shrinks.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    region: Mutex<ScratchRegion>,
}

#[derive(Debug, Default)]
pub struct ScratchRegion {
    bytes: Vec<u8>,
    grow_count: u64,
}

impl ScratchRegion {
    /// Returns exactly `len` writable bytes, growing the region if needed.
    pub fn reserve(&mut self, len: usize) -> &mut [u8] {
        if self.bytes.len() < len {
            debug!("growing scratch buffer {} -> {len} bytes", self.bytes.len());
            self.bytes.resize(len, 0);
            self.grow_count += 1;
        }
        &mut self.bytes[..len]
    }
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds the region for one resize-and-write sequence.
    pub fn lock(&self) -> MutexGuard<'_, ScratchRegion> {
        // Contents are rewritten on every use.
        self.region.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().bytes.len()
    }

    /// How many times the region had to grow.
    pub fn grow_count(&self) -> u64 {
        self.lock().grow_count
    }
}
