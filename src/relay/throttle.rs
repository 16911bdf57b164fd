//! Frame admission control
//!
//! Decides, per raw frame arrival, whether to spend encode work on it. Two
//! gates apply: a wall-clock rate limit bounding encoder output to the
//! target frame rate, and a viewer check that drops everything while nobody
//! is connected.
//!
//! The rate gate runs first and consumes its window even when the frame is
//! then dropped for lack of viewers, so the encode cadence stays bounded
//! across viewer churn. A frame is either encoded and published or entirely
//! discarded; the gate never reorders, only drops.

use std::time::{Duration, Instant};

use super::config::DEFAULT_TARGET_FPS;

/// Verdict for a single raw frame arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Encode and publish this frame
    Accept,
    /// Inside the minimum frame interval, drop
    Throttled,
    /// No viewers connected, drop
    NoViewers,
}

/// Rate gate with a zero-viewer skip
#[derive(Debug)]
pub struct Throttle {
    frame_interval: Duration,
    next_eligible: Option<Instant>,
}

impl Throttle {
    /// Create a throttle with an explicit minimum interval between frames
    ///
    /// A zero interval disables the rate gate; the viewer check still
    /// applies.
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            next_eligible: None,
        }
    }

    /// Create a throttle targeting `fps` frames per second
    ///
    /// Non-finite and non-positive rates fall back to the default rate.
    pub fn from_fps(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            DEFAULT_TARGET_FPS
        };
        Self::new(Duration::from_secs_f64(1.0 / fps))
    }

    /// Minimum interval between accepted frames
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Decide what to do with a frame arriving at `now` while `viewers`
    /// connections are active
    pub fn admit(&mut self, now: Instant, viewers: usize) -> Admission {
        if let Some(next) = self.next_eligible {
            if now < next {
                return Admission::Throttled;
            }
        }
        self.next_eligible = Some(now + self.frame_interval);

        if viewers == 0 {
            return Admission::NoViewers;
        }

        Admission::Accept
    }
}
