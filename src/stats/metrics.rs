//! Relay statistics

/// Counters accumulated by the ingest pump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Raw frames received from the feed
    pub frames_received: u64,
    /// Frames encoded and published to the slot
    pub frames_published: u64,
    /// Frames dropped by the rate gate
    pub throttled: u64,
    /// Frames dropped because no viewer was connected
    pub no_viewer_skips: u64,
    /// Frames rejected for a bad raw length
    pub length_rejects: u64,
    /// Frames the codec failed to compress
    pub encode_failures: u64,
    /// Feed-level failures (connect, read, protocol)
    pub source_errors: u64,
}

impl IngestStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames dropped without reaching the encoder
    pub fn dropped(&self) -> u64 {
        self.throttled + self.no_viewer_skips + self.length_rejects
    }
}

/// Counters for one viewer session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames delivered
    pub frames_sent: u64,
    /// Payload bytes delivered
    pub bytes_sent: u64,
    /// Write opportunities that found nothing new
    pub skips: u64,
    /// Frames dropped for exceeding the session capacity
    pub capacity_drops: u64,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }
}
