//! The frame-buffer publish handoff.
//!
//! A single writer (the render loop) hands finished frames to a single
//! reader (an external consumer) through a fixed region: a small header
//! plus the pixel rows. The writer never blocks unboundedly: if the
//! reader still holds the region after a 10 ms wait the frame is
//! dropped, because in broadcast a fresh late frame is worth less than
//! the next one on time.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::warn;

use strata_core::{EngineError, EngineResult};

/// Maximum time a write waits for the reader before dropping the frame.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(10);

/// Region header exposed to the reader.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub frame_number: i64,
    pub locked: i32,
}

struct Region {
    header: FrameHeader,
    pixels: Vec<u8>,
}

/// Single-writer/single-reader frame handoff with bounded-wait locking.
pub struct FramePublisher {
    region: Mutex<Region>,
    /// Mirror of the stamped frame number, readable without touching
    /// the region lock.
    frame_number: AtomicI64,
    dropped_writes: AtomicU64,
}

impl FramePublisher {
    pub fn new(width: u32, height: u32) -> EngineResult<Self> {
        if width == 0 || height == 0 || width > 16384 || height > 16384 {
            return Err(EngineError::InvalidArgument(format!(
                "frame buffer dimensions {}x{} out of range",
                width, height
            )));
        }

        let stride = (width as usize) * 4;
        Ok(Self {
            region: Mutex::new(Region {
                header: FrameHeader {
                    width: width as i32,
                    height: height as i32,
                    stride: stride as i32,
                    frame_number: 0,
                    locked: 0,
                },
                pixels: vec![0u8; stride * height as usize],
            }),
            frame_number: AtomicI64::new(0),
            dropped_writes: AtomicU64::new(0),
        })
    }

    /// Publish one frame. Waits up to [`WRITE_TIMEOUT`] for the reader;
    /// on timeout the frame is dropped and `false` returned. Rows are
    /// copied in one block when strides match, otherwise row by row
    /// using the smaller stride so neither side overruns.
    pub fn write(&self, data: &[u8], src_stride: usize, frame_number: i64) -> bool {
        let Some(mut region) = self.region.try_lock_for(WRITE_TIMEOUT) else {
            self.dropped_writes.fetch_add(1, Ordering::Relaxed);
            warn!(frame_number, "frame publish dropped: reader held the buffer past the timeout");
            return false;
        };

        let dst_stride = region.header.stride as usize;
        let height = region.header.height as usize;

        if src_stride == dst_stride {
            let len = (dst_stride * height).min(data.len());
            region.pixels[..len].copy_from_slice(&data[..len]);
        } else {
            let copy_stride = src_stride.min(dst_stride);
            for y in 0..height {
                let src_start = y * src_stride;
                if src_start + copy_stride > data.len() {
                    break;
                }
                let dst_start = y * dst_stride;
                region.pixels[dst_start..dst_start + copy_stride]
                    .copy_from_slice(&data[src_start..src_start + copy_stride]);
            }
        }

        region.header.frame_number = frame_number;
        self.frame_number.store(frame_number, Ordering::Relaxed);
        true
    }

    /// Lock the region for reading. The returned lease exposes the
    /// pixels and header; dropping it unlocks the region and lets any
    /// waiting writer proceed.
    pub fn lock(&self) -> FrameLease<'_> {
        let mut guard = self.region.lock();
        guard.header.locked = 1;
        FrameLease { guard }
    }

    /// The last stamped frame number.
    pub fn frame_number(&self) -> i64 {
        self.frame_number.load(Ordering::Relaxed)
    }

    /// Writes dropped because the reader held the region too long.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }
}

/// RAII read lease on the frame region.
pub struct FrameLease<'a> {
    guard: MutexGuard<'a, Region>,
}

impl FrameLease<'_> {
    pub fn width(&self) -> i32 {
        self.guard.header.width
    }

    pub fn height(&self) -> i32 {
        self.guard.header.height
    }

    pub fn stride(&self) -> i32 {
        self.guard.header.stride
    }

    pub fn frame_number(&self) -> i64 {
        self.guard.header.frame_number
    }

    pub fn pixels(&self) -> &[u8] {
        &self.guard.pixels
    }
}

impl Drop for FrameLease<'_> {
    fn drop(&mut self) {
        self.guard.header.locked = 0;
    }
}
