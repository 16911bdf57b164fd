//! Relay error types
//!
//! Capacity failure raised by the delivery path. The offending delivery is
//! dropped; nothing tears down.

/// Error type for relay operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Encoded frame exceeds a session's frame capacity
    FrameTooLarge {
        /// Encoded frame length
        len: usize,
        /// Session frame bound
        capacity: usize,
    },
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::FrameTooLarge { len, capacity } => {
                write!(
                    f,
                    "Encoded frame too large: {} bytes exceeds session capacity {}",
                    len, capacity
                )
            }
        }
    }
}

impl std::error::Error for RelayError {}
