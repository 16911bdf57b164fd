//! framecast
//!
//! Real-time pixel-frame broadcast relay. The relay subscribes to a raw
//! RGBA frame feed, JPEG-encodes the newest frame, and fans the encoded
//! bytes out to WebSocket viewers:
//!
//! ```text
//!  upstream feed            relay core                  viewers
//!  -------------   ----------------------------   ------------------
//!  TCP multipart -> admit -> JPEG encode -> slot -> session -> WS send
//!  subscriber       (rate,    (quality Q)   (one    (skip /
//!                    viewers)               frame)   send / drop)
//! ```
//!
//! Frames are never queued per viewer. The slot holds only the newest
//! encoded frame; a viewer that falls behind skips the generations it
//! missed and resumes at the current one. Frames that arrive while no
//! viewer is connected are discarded before encoding.

pub mod encode;
pub mod error;
pub mod relay;
pub mod server;
pub mod session;
pub mod source;
pub mod stats;

pub use encode::{FrameEncoder, JpegEncoder};
pub use error::{Error, Result};
pub use relay::{FrameSlot, IngestPump, RelayConfig, SessionRegistry};
pub use server::{RelayServer, ServerConfig};
pub use source::{FeedConfig, FeedSubscriber, FrameSource};
