//! WebSocket serving layer
//!
//! Accepts viewer connections and runs one delivery session per viewer:
//!
//! ```text
//! TcpListener --accept--> handshake --register--> session loop
//!                                                    |  wait on slot
//!                                                    |  send frame bytes
//!                                                    '--deregister on exit
//! ```
//!
//! The pipeline state (frame slot, session registry) is shared with the
//! ingest side; this layer only attaches viewers to it.

pub mod config;
pub mod conn;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_LISTEN_PORT};
pub use listener::RelayServer;
