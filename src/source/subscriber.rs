//! Feed subscriber
//!
//! Maintains a TCP connection to the upstream producer, filters messages by
//! subject prefix, and maps matching frames for the ingest pump. Connection
//! loss is handled here with capped exponential backoff; the pump never sees
//! a reconnect, only missed frames.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::relay::config::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::relay::frame::RawFrame;

use super::wire::{self, Message, FRAME_PARTS};
use super::{FrameSource, SourceError};

/// Default producer address
pub const DEFAULT_UPSTREAM_ADDR: &str = "127.0.0.1:42024";

/// Default subject filter
pub const DEFAULT_SUBJECT: &str = "output";

/// Feed subscriber configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Producer address to connect to
    pub upstream_addr: String,

    /// Subject prefix to accept (empty accepts everything)
    pub subject: String,

    /// Frame width stamped on decoded frames
    pub width: u32,

    /// Frame height stamped on decoded frames
    pub height: u32,

    /// Initial reconnect delay
    pub reconnect_min: Duration,

    /// Reconnect delay cap
    pub reconnect_max: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            upstream_addr: DEFAULT_UPSTREAM_ADDR.to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            reconnect_min: Duration::from_millis(50),
            reconnect_max: Duration::from_secs(5),
        }
    }
}

impl FeedConfig {
    /// Set the producer address
    pub fn upstream_addr(mut self, addr: impl Into<String>) -> Self {
        self.upstream_addr = addr.into();
        self
    }

    /// Set the subject prefix filter
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the frame dimensions stamped on decoded frames
    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

struct FeedConn {
    stream: TcpStream,
    buf: BytesMut,
}

/// Subject-filtered frame feed over TCP
pub struct FeedSubscriber {
    config: FeedConfig,
    conn: Option<FeedConn>,
    reconnect_delay: Duration,
}

impl FeedSubscriber {
    /// Create a subscriber; the connection is opened lazily on the first
    /// [`FrameSource::next_frame`] call
    pub fn new(config: FeedConfig) -> Self {
        let reconnect_delay = config.reconnect_min;
        Self {
            config,
            conn: None,
            reconnect_delay,
        }
    }

    async fn connect(&mut self) -> Result<(), SourceError> {
        match TcpStream::connect(&self.config.upstream_addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                tracing::info!(
                    addr = %self.config.upstream_addr,
                    subject = %self.config.subject,
                    "Feed connected"
                );
                self.reconnect_delay = self.config.reconnect_min;
                self.conn = Some(FeedConn {
                    stream,
                    buf: BytesMut::with_capacity(64 * 1024),
                });
                Ok(())
            }
            Err(e) => Err(SourceError::Connect(e)),
        }
    }

    /// Read one complete message; `Ok(None)` means the producer closed the
    /// connection
    async fn read_message(&mut self) -> Result<Option<Message>, SourceError> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Ok(None),
        };

        loop {
            if let Some(message) = wire::decode(&mut conn.buf)? {
                return Ok(Some(message));
            }
            let n = conn
                .stream
                .read_buf(&mut conn.buf)
                .await
                .map_err(SourceError::Read)?;
            if n == 0 {
                return Ok(None);
            }
        }
    }

    fn frame_from(&self, message: Message) -> Option<RawFrame> {
        let subject = match message.subject() {
            Some(subject) => subject,
            None => {
                tracing::debug!("Message without subject, skipping");
                return None;
            }
        };
        if !subject.starts_with(self.config.subject.as_str()) {
            tracing::debug!(subject = subject, "Foreign subject, skipping");
            return None;
        }
        if message.parts.len() != FRAME_PARTS {
            tracing::debug!(
                parts = message.parts.len(),
                "Unexpected message shape, skipping"
            );
            return None;
        }
        let sequence = match message.selector() {
            Some(selector) => u64::from(selector),
            None => {
                tracing::debug!("Malformed frame selector, skipping");
                return None;
            }
        };

        Some(RawFrame::new(
            sequence,
            self.config.width,
            self.config.height,
            message.parts[2].clone(),
        ))
    }

    async fn backoff(&mut self) {
        let delay = self.reconnect_delay;
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Feed backoff");
        tokio::time::sleep(delay).await;
        self.reconnect_delay = (delay * 2).min(self.config.reconnect_max);
    }
}

#[async_trait]
impl FrameSource for FeedSubscriber {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
        loop {
            if self.conn.is_none() {
                if let Err(e) = self.connect().await {
                    self.backoff().await;
                    return Err(e);
                }
            }

            match self.read_message().await {
                Ok(Some(message)) => {
                    if let Some(frame) = self.frame_from(message) {
                        return Ok(Some(frame));
                    }
                    // Filtered out; keep reading
                }
                Ok(None) => {
                    tracing::warn!("Feed closed by producer, reconnecting");
                    self.conn = None;
                    self.backoff().await;
                }
                Err(e) => {
                    self.conn = None;
                    self.backoff().await;
                    return Err(e);
                }
            }
        }
    }
}
