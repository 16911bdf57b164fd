//! JPEG frame encoder
//!
//! Matches what the feed's viewers expect: RGBA input, quality 95 by
//! default, 4:4:4 sampling so rendered text stays sharp at small frame
//! sizes.

use bytes::Bytes;
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

use crate::relay::config::DEFAULT_JPEG_QUALITY;
use crate::relay::frame::RawFrame;

use super::{EncodeError, FrameEncoder, MAX_DIMENSION};

/// JPEG encoder with a fixed quality setting
#[derive(Debug, Clone)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Create an encoder with the given quality, clamped to 1-100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Quality setting in use
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &RawFrame) -> Result<Bytes, EncodeError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EncodeError::EmptyFrame);
        }
        if frame.width > MAX_DIMENSION || frame.height > MAX_DIMENSION {
            return Err(EncodeError::DimensionTooLarge(
                frame.width.max(frame.height),
            ));
        }

        let expected = RawFrame::expected_len(frame.width, frame.height);
        if frame.pixels.len() != expected {
            return Err(EncodeError::PixelLengthMismatch {
                expected,
                actual: frame.pixels.len(),
            });
        }

        let mut out = Vec::with_capacity(frame.pixels.len() / 4);
        let mut encoder = Encoder::new(&mut out, self.quality);
        encoder.set_sampling_factor(SamplingFactor::F_1_1);
        encoder
            .encode(
                &frame.pixels,
                frame.width as u16,
                frame.height as u16,
                ColorType::Rgba,
            )
            .map_err(|e| EncodeError::Codec(e.to_string()))?;

        Ok(Bytes::from(out))
    }
}
