//! Frame buffer bridge between guest memory and host-owned images.
//!
//! The guest owns a resizable linear memory that may relocate whenever guest
//! code runs. The bridge therefore never holds a view across calls: it
//! re-acquires the current memory on every present, bounds-checks the
//! published descriptor against it, and copies the pixels into a host-owned
//! [`Frame`] before anything downstream sees them.

use crate::error::PresentError;

/// Bytes per RGBA pixel.
const PIXEL_STRIDE: u64 = 4;

/// Where and how large the guest's current pixel buffer is.
///
/// Written only from within guest calls (`publish_frame` and the post-call
/// invalidation hook); read only at present time. Same thread, no overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Byte offset of the pixel data in guest memory; 0 means "no frame".
    pub pointer: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Bumped whenever the guest's memory may have moved; any cache keyed
    /// on an older generation must be refreshed from the current memory.
    pub generation: u64,
}

impl FrameDescriptor {
    /// Record a publish. Overwrites whatever was there; within one frame
    /// the last write wins.
    pub fn record(&mut self, width: u32, height: u32, pointer: u32) {
        self.pointer = pointer;
        self.width = width;
        self.height = height;
        self.invalidate();
    }

    /// Note that guest code ran, so the memory may have grown or relocated.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Read access to the guest's current linear memory.
///
/// Implementations hand out the memory *as it is now*. The bridge acquires
/// a fresh view through this trait on every present and never stores one.
pub trait GuestMemory {
    /// Current size in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow `len` bytes at `offset`, or `None` when out of range.
    fn slice(&self, offset: usize, len: usize) -> Option<&[u8]>;
}

impl GuestMemory for &[u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.get(offset..offset.checked_add(len)?)
    }
}

/// A host-owned RGBA8 image, row-major, `width * 4` bytes per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, `width * height * 4` long.
    pub fn data(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes per row.
    pub fn pitch(&self) -> usize {
        self.width as usize * PIXEL_STRIDE as usize
    }
}

/// Copies the published region of guest memory into a host-owned [`Frame`].
///
/// The pixel allocation is reused across frames. A re-copy happens only
/// when the descriptor generation moved, i.e. when guest code ran since the
/// last present; the host copy itself can never go stale because guest
/// memory only changes inside guest calls.
#[derive(Debug, Default)]
pub struct FrameBridge {
    frame: Frame,
    presented: Option<u64>,
}

impl FrameBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached frame, e.g. when a new guest is loaded.
    pub fn reset(&mut self) {
        self.frame = Frame::default();
        self.presented = None;
    }

    /// Snapshot the published region of guest memory.
    ///
    /// Returns `Ok(None)` while the guest has published nothing (zero
    /// pointer or zero size); that is "no frame yet", not an error. An
    /// out-of-bounds descriptor fails without reading any memory.
    pub fn present(
        &mut self,
        memory: &impl GuestMemory,
        descriptor: &FrameDescriptor,
    ) -> Result<Option<&Frame>, PresentError> {
        if descriptor.pointer == 0 || descriptor.width == 0 || descriptor.height == 0 {
            return Ok(None);
        }

        // All sizing in u64 so hostile dimensions saturate instead of
        // wrapping into a small, in-bounds length.
        let byte_len = u64::from(descriptor.width)
            .saturating_mul(u64::from(descriptor.height))
            .saturating_mul(PIXEL_STRIDE);
        let pointer = u64::from(descriptor.pointer);
        let memory_len = memory.len() as u64;
        if pointer.saturating_add(byte_len) > memory_len {
            return Err(PresentError::OutOfBounds {
                pointer,
                byte_len,
                memory_len,
            });
        }

        if self.presented != Some(descriptor.generation) {
            let src = memory
                .slice(descriptor.pointer as usize, byte_len as usize)
                .ok_or(PresentError::OutOfBounds {
                    pointer,
                    byte_len,
                    memory_len,
                })?;
            self.frame.width = descriptor.width;
            self.frame.height = descriptor.height;
            self.frame.pixels.resize(src.len(), 0);
            self.frame.pixels.copy_from_slice(src);
            self.presented = Some(descriptor.generation);
        }

        Ok(Some(&self.frame))
    }
}
