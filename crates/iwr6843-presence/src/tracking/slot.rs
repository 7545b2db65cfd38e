//! Person slots: stable identities onto which sensor tracks are bound.

use std::fmt;

use iwr6843_hardware::Vec3;

use super::fall::{FallConfig, FallDetector};
use super::MAX_SLOTS;
use crate::boundary::RetainedDetection;

/// Slot number, 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u8);

impl SlotId {
    pub fn new(id: u8) -> Option<Self> {
        (1..=MAX_SLOTS as u8).contains(&id).then_some(Self(id))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Zero-based table index.
    pub fn index(&self) -> usize {
        usize::from(self.0) - 1
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Binding state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Nobody is associated with the slot.
    Unbound,
    /// Updated by `track_id` in the latest frame.
    Bound { track_id: u32 },
    /// `track_id` has been missing for `missed` consecutive frames.
    Stale { track_id: u32, missed: u32 },
}

impl SlotState {
    pub fn track_id(&self) -> Option<u32> {
        match self {
            SlotState::Unbound => None,
            SlotState::Bound { track_id } | SlotState::Stale { track_id, .. } => Some(*track_id),
        }
    }

    /// Bound or stale.
    pub fn is_occupied(&self) -> bool {
        !matches!(self, SlotState::Unbound)
    }
}

/// Observable state of a slot at the end of a frame cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotSnapshot {
    pub id: SlotId,
    pub state: SlotState,
    pub position: Option<Vec3>,
    pub velocity: Option<Vec3>,
    pub present: bool,
    pub fallen: bool,
}

#[derive(Debug, Clone)]
pub struct PersonSlot {
    id: SlotId,
    label: String,
    state: SlotState,
    position: Option<Vec3>,
    velocity: Option<Vec3>,
    present: bool,
    last_seen_cycle: Option<u64>,
    fall: FallDetector,
}

impl PersonSlot {
    pub fn new(id: SlotId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            state: SlotState::Unbound,
            position: None,
            velocity: None,
            present: false,
            last_seen_cycle: None,
            fall: FallDetector::new(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn position(&self) -> Option<Vec3> {
        self.position
    }

    pub fn velocity(&self) -> Option<Vec3> {
        self.velocity
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn is_fallen(&self) -> bool {
        self.fall.is_fallen()
    }

    /// Frame cycle of the last matching detection.
    pub fn last_seen_cycle(&self) -> Option<u64> {
        self.last_seen_cycle
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            id: self.id,
            state: self.state,
            position: self.position,
            velocity: self.velocity,
            present: self.present,
            fallen: self.fall.is_fallen(),
        }
    }

    /// Bind a new track. Returns `true` if the first sample already raised a fall.
    pub(crate) fn bind(&mut self, retained: &RetainedDetection, cycle: u64, fall: &FallConfig) -> bool {
        self.fall.reset();
        self.observe(retained, cycle, fall)
    }

    /// Apply a matching detection. Returns `true` when a fall is raised.
    pub(crate) fn observe(&mut self, retained: &RetainedDetection, cycle: u64, fall: &FallConfig) -> bool {
        let d = &retained.detection;
        self.state = SlotState::Bound {
            track_id: d.track_id,
        };
        self.position = Some(d.position);
        self.velocity = Some(d.velocity);
        self.present = retained.inside_presence;
        self.last_seen_cycle = Some(cycle);
        self.fall.update(d.position.z, d.velocity.z, cycle, fall)
    }

    /// Record a frame without a matching detection. Returns the miss count.
    pub(crate) fn miss(&mut self) -> u32 {
        let (track_id, missed) = match self.state {
            SlotState::Unbound => return 0,
            SlotState::Bound { track_id } => (track_id, 1),
            SlotState::Stale { track_id, missed } => (track_id, missed.saturating_add(1)),
        };
        self.state = SlotState::Stale { track_id, missed };
        missed
    }

    /// Return to `Unbound`, clearing coordinates and flags.
    pub(crate) fn release(&mut self) {
        self.state = SlotState::Unbound;
        self.position = None;
        self.velocity = None;
        self.present = false;
        self.fall.reset();
    }
}
