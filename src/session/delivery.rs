//! Per-viewer delivery state machine
//!
//! Decides on each write opportunity whether the viewer is behind the
//! current generation and, if so, hands the frame bytes to the transport.
//! The machine is a plain synchronous object, independent of the WebSocket
//! layer, so the skip/send/reject rules are testable without a socket.

use bytes::Bytes;

use crate::relay::error::RelayError;
use crate::relay::frame::EncodedFrame;

/// Action produced by a write opportunity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Viewer already has the current generation, or the slot is empty
    Skip,
    /// Ship these bytes and record the generation as delivered
    Send {
        /// Generation being delivered
        generation: u64,
        /// Frame payload (reference-counted)
        bytes: Bytes,
    },
}

/// Tracks how far a single viewer has caught up
///
/// A fresh session has delivered nothing, so its first write opportunity
/// ships the current frame if one exists.
#[derive(Debug)]
pub struct DeliveryState {
    frame_capacity: usize,
    last_delivered: Option<u64>,
}

impl DeliveryState {
    /// Create delivery state for a newly established session
    pub fn new(frame_capacity: usize) -> Self {
        Self {
            frame_capacity,
            last_delivered: None,
        }
    }

    /// Generation most recently delivered to this viewer
    pub fn last_delivered(&self) -> Option<u64> {
        self.last_delivered
    }

    /// Decide what to do with a write opportunity given the current slot
    /// contents
    ///
    /// A frame larger than the session's capacity is rejected without
    /// advancing the delivery cursor, so a later smaller frame still goes
    /// out. Repeating the call with an unchanged slot is a no-op.
    pub fn on_write_ready(
        &mut self,
        snapshot: Option<&EncodedFrame>,
    ) -> Result<Delivery, RelayError> {
        let frame = match snapshot {
            Some(frame) => frame,
            None => return Ok(Delivery::Skip),
        };

        if self.last_delivered == Some(frame.generation) {
            return Ok(Delivery::Skip);
        }

        let len = frame.len();
        if len > self.frame_capacity {
            return Err(RelayError::FrameTooLarge {
                len,
                capacity: self.frame_capacity,
            });
        }

        self.last_delivered = Some(frame.generation);
        Ok(Delivery::Send {
            generation: frame.generation,
            bytes: frame.bytes.clone(),
        })
    }
}
