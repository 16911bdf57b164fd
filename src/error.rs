//! Crate-level error types

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the serving path
///
/// Pipeline errors (encode, feed, capacity) are handled where they occur:
/// the ingest pump and the session loop log and count them, so they never
/// propagate here.
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure
    Io(std::io::Error),

    /// WebSocket protocol failure
    WebSocket(tokio_tungstenite::tungstenite::Error),

    /// Viewer did not complete the WebSocket handshake in time
    HandshakeTimeout,

    /// Outbound send did not complete in time; the viewer stopped draining
    SendTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::HandshakeTimeout => write!(f, "WebSocket handshake timed out"),
            Error::SendTimeout => write!(f, "Send timed out"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}
