//! Upstream frame feed
//!
//! The relay pulls raw frames from a single producer over a subject-filtered
//! pub/sub feed. The transport details live in [`subscriber`]; the ingest
//! pump only sees the [`FrameSource`] trait, so it can be driven by scripted
//! sources in tests.

pub mod subscriber;
pub mod wire;

pub use subscriber::{FeedConfig, FeedSubscriber};

use async_trait::async_trait;

use crate::relay::frame::RawFrame;

/// Error type for feed operations
#[derive(Debug)]
pub enum SourceError {
    /// Failed to connect to the producer
    Connect(std::io::Error),
    /// Read failure on an established feed connection
    Read(std::io::Error),
    /// Producer sent a malformed message
    Wire(wire::WireError),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Connect(e) => write!(f, "Feed connect failed: {}", e),
            SourceError::Read(e) => write!(f, "Feed read failed: {}", e),
            SourceError::Wire(e) => write!(f, "Feed protocol error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<wire::WireError> for SourceError {
    fn from(e: wire::WireError) -> Self {
        SourceError::Wire(e)
    }
}

/// A stream of raw frames feeding the relay
///
/// `Ok(None)` means the source has ended for good. An `Err` is a recoverable
/// failure the pump counts and moves past; implementations own their
/// reconnect policy.
#[async_trait]
pub trait FrameSource: Send {
    /// Pull the next raw frame
    async fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError>;
}
