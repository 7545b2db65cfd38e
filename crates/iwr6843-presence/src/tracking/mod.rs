//! Person-slot tracking.
//!
//! - [`TrackManager`] binds sensor tracks to slots and ages them out
//! - [`PersonSlot`] holds per-slot state and its [`FallDetector`]

mod fall;
mod manager;
mod slot;

pub use fall::{FallConfig, FallDetector};
pub use manager::{CycleOutcome, TrackManager, TrackerConfig};
pub use slot::{PersonSlot, SlotId, SlotSnapshot, SlotState};

/// Number of person slots a component can declare.
pub const MAX_SLOTS: usize = 5;
