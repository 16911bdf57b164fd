//! Viewer session handling
//!
//! A session is one connected viewer: a delivery cursor tracking the last
//! generation it received, bounded by a per-session frame capacity. The
//! connection event loop lives in the server module; the state machine here
//! carries the delivery rules.

pub mod delivery;

pub use delivery::{Delivery, DeliveryState};
