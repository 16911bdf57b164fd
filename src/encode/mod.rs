//! Frame encoding
//!
//! Compresses raw RGBA frames into the wire format shipped to viewers. The
//! codec sits behind a trait so the ingest pipeline can be tested without
//! doing real compression work.

pub mod jpeg;

pub use jpeg::JpegEncoder;

use bytes::Bytes;

use crate::relay::frame::RawFrame;

/// Largest frame dimension the JPEG format supports
pub const MAX_DIMENSION: u32 = 65_535;

/// Error type for encode operations
#[derive(Debug, Clone)]
pub enum EncodeError {
    /// Frame has a zero dimension
    EmptyFrame,
    /// Frame dimension exceeds what the codec supports
    DimensionTooLarge(u32),
    /// Pixel buffer length does not match the frame dimensions
    PixelLengthMismatch {
        /// Bytes the dimensions call for
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },
    /// Codec-level failure
    Codec(String),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::EmptyFrame => write!(f, "Frame has a zero dimension"),
            EncodeError::DimensionTooLarge(dim) => {
                write!(f, "Frame dimension {} exceeds codec limit", dim)
            }
            EncodeError::PixelLengthMismatch { expected, actual } => {
                write!(
                    f,
                    "Pixel buffer length mismatch: expected {} bytes, got {}",
                    expected, actual
                )
            }
            EncodeError::Codec(msg) => write!(f, "Codec error: {}", msg),
        }
    }
}

impl std::error::Error for EncodeError {}

/// A codec turning raw frames into compressed payloads
pub trait FrameEncoder: Send {
    /// Compress a raw frame
    ///
    /// A failure drops the frame; the caller does not retry.
    fn encode(&self, frame: &RawFrame) -> Result<Bytes, EncodeError>;
}
