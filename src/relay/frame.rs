//! Frame types carried through the relay
//!
//! `RawFrame` is the uncompressed input pulled from the feed; `EncodedFrame`
//! is the compressed output held by the frame slot and fanned out to viewers.

use bytes::Bytes;

/// Bytes per pixel in the raw feed (RGBA)
pub const RAW_BYTES_PER_PIXEL: usize = 4;

/// An uncompressed RGBA frame received from the feed
///
/// Consumed exactly once by the ingest pump; never retained past the
/// encode decision.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Sequence number assigned by the producer
    pub sequence: u64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data, `width * height * 4` bytes, row-major RGBA
    pub pixels: Bytes,
}

impl RawFrame {
    /// Create a raw frame
    pub fn new(sequence: u64, width: u32, height: u32, pixels: Bytes) -> Self {
        Self {
            sequence,
            width,
            height,
            pixels,
        }
    }

    /// Expected pixel buffer length for the given dimensions
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * RAW_BYTES_PER_PIXEL
    }
}

/// A compressed frame published to the slot
///
/// Cheap to clone: the payload is reference-counted, so every viewer shares
/// one allocation and "releasing" a replaced frame is the drop of the last
/// handle.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Generation counter; the first published frame is generation 1
    pub generation: u64,
    /// Compressed image data
    pub bytes: Bytes,
}

impl EncodedFrame {
    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
