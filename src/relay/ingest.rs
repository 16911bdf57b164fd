//! Ingest pump
//!
//! Drives the feed-to-slot half of the relay: pull a raw frame, validate its
//! length, run the admission gate, encode, publish. One pump instance runs
//! as its own task; the serving side only ever sees the slot.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::encode::FrameEncoder;
use crate::relay::config::RelayConfig;
use crate::relay::frame::RawFrame;
use crate::relay::registry::SessionRegistry;
use crate::relay::slot::FrameSlot;
use crate::relay::throttle::{Admission, Throttle};
use crate::source::FrameSource;
use crate::stats::IngestStats;

/// Pulls frames from the source and publishes encoded frames to the slot
pub struct IngestPump<S, E> {
    source: S,
    encoder: E,
    slot: Arc<FrameSlot>,
    registry: Arc<SessionRegistry>,
    throttle: Throttle,
    expected_raw_len: usize,
    stats: IngestStats,
}

impl<S, E> IngestPump<S, E>
where
    S: FrameSource,
    E: FrameEncoder,
{
    /// Create a pump over the given source and encoder
    pub fn new(
        config: &RelayConfig,
        source: S,
        encoder: E,
        slot: Arc<FrameSlot>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            source,
            encoder,
            slot,
            registry,
            throttle: Throttle::from_fps(config.target_fps),
            expected_raw_len: config.raw_frame_len(),
            stats: IngestStats::default(),
        }
    }

    /// Replace the admission throttle
    pub fn throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Run until the source ends or `cancel` fires
    ///
    /// Logs the accumulated counters on the way out and returns them.
    pub async fn run(mut self, cancel: CancellationToken) -> IngestStats {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Ingest pump cancelled");
                    break;
                }
                frame = self.source.next_frame() => frame,
            };

            match frame {
                Ok(Some(frame)) => self.handle_frame(frame),
                Ok(None) => {
                    tracing::info!("Frame source ended");
                    break;
                }
                Err(e) => {
                    // The source owns reconnect and backoff; here the
                    // failure is only counted
                    self.stats.source_errors += 1;
                    tracing::warn!(error = %e, "Frame source error");
                }
            }
        }

        tracing::info!(
            frames_received = self.stats.frames_received,
            frames_published = self.stats.frames_published,
            throttled = self.stats.throttled,
            no_viewer_skips = self.stats.no_viewer_skips,
            length_rejects = self.stats.length_rejects,
            encode_failures = self.stats.encode_failures,
            source_errors = self.stats.source_errors,
            "Ingest pump finished"
        );
        self.stats
    }

    fn handle_frame(&mut self, frame: RawFrame) {
        self.stats.frames_received += 1;

        if frame.pixels.len() != self.expected_raw_len {
            self.stats.length_rejects += 1;
            tracing::warn!(
                sequence = frame.sequence,
                expected = self.expected_raw_len,
                actual = frame.pixels.len(),
                "Raw frame length mismatch, dropping"
            );
            return;
        }

        match self
            .throttle
            .admit(Instant::now(), self.registry.active_count())
        {
            Admission::Throttled => {
                self.stats.throttled += 1;
                return;
            }
            Admission::NoViewers => {
                self.stats.no_viewer_skips += 1;
                return;
            }
            Admission::Accept => {}
        }

        match self.encoder.encode(&frame) {
            Ok(bytes) => {
                let encoded_len = bytes.len();
                let generation = self.slot.publish(bytes);
                self.stats.frames_published += 1;
                tracing::debug!(
                    generation = generation,
                    sequence = frame.sequence,
                    encoded_len = encoded_len,
                    "Frame published"
                );
            }
            Err(e) => {
                self.stats.encode_failures += 1;
                tracing::error!(sequence = frame.sequence, error = %e, "Frame encode failed");
            }
        }
    }
}
