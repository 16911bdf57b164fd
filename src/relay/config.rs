//! Relay configuration

use crate::encode::MAX_DIMENSION;
use crate::relay::frame::RawFrame;

/// Default frame width in pixels
pub const DEFAULT_FRAME_WIDTH: u32 = 192;

/// Default frame height in pixels
pub const DEFAULT_FRAME_HEIGHT: u32 = 320;

/// Default target output frame rate
pub const DEFAULT_TARGET_FPS: f64 = 30.0;

/// Default JPEG quality
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Bytes-per-pixel estimate used to size the per-session frame bound
pub const CAPACITY_BYTES_PER_PIXEL: usize = 3;

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Target output frame rate (frames per second)
    pub target_fps: f64,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Per-session frame size bound in bytes (0 = derive from dimensions)
    pub max_frame_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            target_fps: DEFAULT_TARGET_FPS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_frame_bytes: 0,
        }
    }
}

impl RelayConfig {
    /// Set the frame dimensions
    ///
    /// Each dimension is clamped to what the codec supports.
    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width.clamp(1, MAX_DIMENSION);
        self.height = height.clamp(1, MAX_DIMENSION);
        self
    }

    /// Set the target output frame rate
    ///
    /// Non-finite and non-positive values fall back to the default.
    pub fn target_fps(mut self, fps: f64) -> Self {
        self.target_fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            DEFAULT_TARGET_FPS
        };
        self
    }

    /// Set the JPEG quality, clamped to 1-100
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Set an explicit per-session frame size bound
    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Effective per-session frame bound
    ///
    /// Defaults to `width * height * 3`: the compressed frame estimate the
    /// sessions are sized for.
    pub fn frame_capacity(&self) -> usize {
        if self.max_frame_bytes > 0 {
            self.max_frame_bytes
        } else {
            self.width as usize * self.height as usize * CAPACITY_BYTES_PER_PIXEL
        }
    }

    /// Expected raw frame length for the configured dimensions
    pub fn raw_frame_len(&self) -> usize {
        RawFrame::expected_len(self.width, self.height)
    }
}
