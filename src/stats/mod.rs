//! Statistics for the ingest pump and viewer sessions

pub mod metrics;

pub use metrics::{IngestStats, SessionStats};
