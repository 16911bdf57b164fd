//! Core frame relay
//!
//! A single-slot, latest-wins broadcast fabric: the ingest pump publishes at
//! most one live encoded frame, and every viewer session independently
//! catches up to it. Nothing is queued per viewer; a slow session skips
//! straight to the newest frame on its next wake.
//!
//! # Architecture
//!
//! ```text
//!   feed ──► IngestPump ── Throttle ── encode ──► FrameSlot
//!                             ▲                      │ watch
//!                             │                      ├────► session task ──► ws
//!              SessionRegistry.active_count()        ├────► session task ──► ws
//!                                                    └────► session task ──► ws
//! ```
//!
//! # Zero-Copy Fan-out
//!
//! The slot holds one `EncodedFrame` whose payload is a `bytes::Bytes`.
//! Publishing swaps the frame behind a `tokio::sync::watch` channel, which
//! both replaces the value and wakes every subscriber atomically; each
//! session then clones the payload, which is a reference-count bump shared
//! across all viewers rather than a copy.

pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod registry;
pub mod slot;
pub mod throttle;

pub use config::RelayConfig;
pub use error::RelayError;
pub use frame::{EncodedFrame, RawFrame};
pub use ingest::IngestPump;
pub use registry::{SessionId, SessionRegistry};
pub use slot::FrameSlot;
pub use throttle::{Admission, Throttle};
