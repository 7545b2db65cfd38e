//! Track manager: maps transient sensor track IDs onto person slots.
//!
//! Per frame cycle:
//! 1. Detections whose track ID is already bound (or stale) update that slot.
//!    A repeated track ID within one frame is ignored after its first use.
//! 2. Occupied slots without a match record a miss; `Bound` becomes `Stale`,
//!    and a slot missing for more than `stale_timeout_cycles` is released.
//! 3. Remaining detections take the lowest-numbered free slot, in detection
//!    order, as long as fewer than `max_tracks` slots are occupied.

use serde::{Deserialize, Serialize};

use super::fall::FallConfig;
use super::slot::{PersonSlot, SlotId, SlotSnapshot};
use crate::boundary::RetainedDetection;
use crate::config::SlotDeclaration;
use crate::error::ConfigError;

/// Configuration for [`TrackManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Missed frames tolerated before a slot is released (default: 15)
    pub stale_timeout_cycles: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stale_timeout_cycles: 15,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stale_timeout_cycles == 0 {
            return Err(ConfigError::invalid_value(
                "tracker.stale_timeout_cycles",
                "must be > 0",
            ));
        }
        Ok(())
    }
}

/// What changed during one [`TrackManager::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    pub cycle: u64,
    /// Slots updated by their existing track.
    pub updated: Vec<SlotId>,
    /// Slots that took a new track.
    pub bound: Vec<SlotId>,
    /// Slots that went stale this cycle.
    pub staled: Vec<SlotId>,
    pub released: Vec<SlotId>,
    /// Slots whose fall flag was raised.
    pub falls: Vec<SlotId>,
    /// Detections dropped because no slot was available.
    pub dropped_no_slot: usize,
    /// Detections ignored for repeating a track ID.
    pub duplicates: usize,
}

pub struct TrackManager {
    config: TrackerConfig,
    fall: FallConfig,
    slots: Vec<PersonSlot>,
    cycle: u64,
}

impl TrackManager {
    /// Create one slot per declaration, ordered by slot ID.
    ///
    /// Declarations with an ID outside 1..=5 are ignored; configuration
    /// validation rejects them earlier.
    pub fn new(declarations: &[SlotDeclaration], config: TrackerConfig, fall: FallConfig) -> Self {
        let mut slots: Vec<PersonSlot> = declarations
            .iter()
            .filter_map(|d| SlotId::new(d.id).map(|id| PersonSlot::new(id, d.display_label())))
            .collect();
        slots.sort_by_key(|s| s.id());
        slots.dedup_by_key(|s| s.id());
        Self {
            config,
            fall,
            slots,
            cycle: 0,
        }
    }

    pub fn slots(&self) -> &[PersonSlot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&PersonSlot> {
        self.slots.iter().find(|s| s.id() == id)
    }

    pub fn snapshots(&self) -> Vec<SlotSnapshot> {
        self.slots.iter().map(PersonSlot::snapshot).collect()
    }

    /// Frame cycles processed so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state().is_occupied()).count()
    }

    pub fn any_occupied(&self) -> bool {
        self.slots.iter().any(|s| s.state().is_occupied())
    }

    /// Run one frame cycle over the detections that passed the tracking volume.
    pub fn update(&mut self, detections: &[RetainedDetection], max_tracks: u8) -> CycleOutcome {
        self.cycle += 1;
        let cycle = self.cycle;
        let mut outcome = CycleOutcome {
            cycle,
            ..CycleOutcome::default()
        };
        let mut touched = vec![false; self.slots.len()];
        let mut seen: Vec<u32> = Vec::with_capacity(detections.len());
        let mut unmatched: Vec<&RetainedDetection> = Vec::new();

        for retained in detections {
            let track_id = retained.detection.track_id;
            if seen.contains(&track_id) {
                tracing::debug!(track = track_id, "Duplicate track ID in frame");
                outcome.duplicates += 1;
                continue;
            }
            seen.push(track_id);

            match self
                .slots
                .iter()
                .position(|s| s.state().track_id() == Some(track_id))
            {
                Some(i) => {
                    touched[i] = true;
                    let slot = &mut self.slots[i];
                    outcome.updated.push(slot.id());
                    if slot.observe(retained, cycle, &self.fall) {
                        outcome.falls.push(slot.id());
                    }
                }
                None => unmatched.push(retained),
            }
        }

        for (i, slot) in self.slots.iter_mut().enumerate() {
            if touched[i] || !slot.state().is_occupied() {
                continue;
            }
            let missed = slot.miss();
            if missed > self.config.stale_timeout_cycles {
                tracing::debug!(slot = %slot.id(), missed, "Slot released after timeout");
                slot.release();
                outcome.released.push(slot.id());
            } else if missed == 1 {
                tracing::debug!(slot = %slot.id(), "Slot went stale");
                outcome.staled.push(slot.id());
            }
        }

        let limit = usize::from(max_tracks);
        for retained in unmatched {
            let free = self.slots.iter().position(|s| !s.state().is_occupied());
            match free {
                Some(i) if self.occupied_count() < limit => {
                    let slot = &mut self.slots[i];
                    tracing::debug!(
                        slot = %slot.id(),
                        track = retained.detection.track_id,
                        "Track bound to slot"
                    );
                    outcome.bound.push(slot.id());
                    if slot.bind(retained, cycle, &self.fall) {
                        outcome.falls.push(slot.id());
                    }
                }
                _ => {
                    tracing::debug!(
                        track = retained.detection.track_id,
                        occupied = self.occupied_count(),
                        max_tracks,
                        "No free slot; detection dropped"
                    );
                    outcome.dropped_no_slot += 1;
                }
            }
        }

        for id in &outcome.falls {
            tracing::info!(slot = %id, cycle, "Fall detected");
        }

        outcome
    }

    /// Release the highest-numbered occupied slots until at most `max_tracks` remain.
    pub fn enforce_max_tracks(&mut self, max_tracks: u8) -> Vec<SlotId> {
        let mut released = Vec::new();
        while self.occupied_count() > usize::from(max_tracks) {
            match self.slots.iter_mut().rev().find(|s| s.state().is_occupied()) {
                Some(slot) => {
                    slot.release();
                    released.push(slot.id());
                }
                None => break,
            }
        }
        if !released.is_empty() {
            tracing::debug!(?released, max_tracks, "Slots released by track limit");
        }
        released
    }

    /// Release every occupied slot.
    pub fn release_all(&mut self) -> Vec<SlotId> {
        let mut released = Vec::new();
        for slot in &mut self.slots {
            if slot.state().is_occupied() {
                slot.release();
                released.push(slot.id());
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::SlotState;
    use iwr6843_hardware::{Detection, Vec3};

    fn det(id: u32, x: f32) -> RetainedDetection {
        RetainedDetection {
            detection: Detection {
                track_id: id,
                position: Vec3::new(x, 0.0, 1.2),
                velocity: Vec3::default(),
                acceleration: Vec3::default(),
                confidence: 1.0,
            },
            inside_presence: true,
        }
    }

    fn manager() -> TrackManager {
        let decls: Vec<SlotDeclaration> = (1..=5).map(SlotDeclaration::new).collect();
        TrackManager::new(&decls, TrackerConfig::default(), FallConfig::default())
    }

    fn slot(n: u8) -> SlotId {
        SlotId::new(n).unwrap()
    }

    #[test]
    fn test_same_detection_keeps_same_slot() {
        let mut mgr = manager();
        for _ in 0..10 {
            mgr.update(&[det(42, 0.5)], 5);
        }
        assert_eq!(
            mgr.slot(slot(1)).unwrap().state(),
            SlotState::Bound { track_id: 42 }
        );
        assert_eq!(mgr.occupied_count(), 1);
    }

    #[test]
    fn test_first_fit_by_detection_order() {
        let mut mgr = manager();
        let outcome = mgr.update(&[det(9, 0.0), det(3, 1.0)], 5);
        assert_eq!(outcome.bound, vec![slot(1), slot(2)]);
        assert_eq!(mgr.slots()[0].state().track_id(), Some(9));
        assert_eq!(mgr.slots()[1].state().track_id(), Some(3));
    }

    #[test]
    fn test_freed_low_slot_is_reused_first() {
        let mut mgr = manager();
        mgr.update(&[det(1, 0.0), det(2, 0.0)], 5);
        mgr.release_all();
        mgr.update(&[det(2, 0.0)], 5);
        mgr.update(&[det(2, 0.0), det(7, 0.0)], 5);
        assert_eq!(mgr.slots()[0].state().track_id(), Some(2));
        assert_eq!(mgr.slots()[1].state().track_id(), Some(7));
    }

    #[test]
    fn test_max_tracks_caps_assignment() {
        let mut mgr = manager();
        let outcome = mgr.update(&[det(1, 0.0), det(2, 0.0), det(3, 0.0)], 2);
        assert_eq!(outcome.bound.len(), 2);
        assert_eq!(outcome.dropped_no_slot, 1);
        assert_eq!(mgr.occupied_count(), 2);
    }

    #[test]
    fn test_duplicate_track_ids_ignored() {
        let mut mgr = manager();
        let outcome = mgr.update(&[det(5, 0.0), det(5, 2.0)], 5);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(mgr.occupied_count(), 1);
        assert_eq!(mgr.slots()[0].position().unwrap().x, 0.0);
    }

    #[test]
    fn test_staleness_timeout() {
        let mut mgr = manager();
        mgr.update(&[det(4, 0.0)], 5);

        let first_miss = mgr.update(&[], 5);
        assert_eq!(first_miss.staled, vec![slot(1)]);

        for _ in 0..14 {
            mgr.update(&[], 5);
        }
        assert_eq!(
            mgr.slots()[0].state(),
            SlotState::Stale {
                track_id: 4,
                missed: 15
            }
        );

        let outcome = mgr.update(&[], 5);
        assert_eq!(outcome.released, vec![slot(1)]);
        let snap = mgr.slots()[0].snapshot();
        assert_eq!(snap.state, SlotState::Unbound);
        assert!(!snap.present);
        assert!(!snap.fallen);
    }

    #[test]
    fn test_stale_slot_revived_by_same_track() {
        let mut mgr = manager();
        mgr.update(&[det(4, 0.0)], 5);
        mgr.update(&[], 5);
        mgr.update(&[det(8, 0.0), det(4, 0.0)], 5);

        assert_eq!(mgr.slots()[0].state(), SlotState::Bound { track_id: 4 });
        assert_eq!(mgr.slots()[1].state(), SlotState::Bound { track_id: 8 });
    }

    #[test]
    fn test_enforce_max_tracks_releases_highest() {
        let mut mgr = manager();
        mgr.update(&[det(1, 0.0), det(2, 0.0), det(3, 0.0)], 5);
        let released = mgr.enforce_max_tracks(1);
        assert_eq!(released, vec![slot(3), slot(2)]);
        assert_eq!(mgr.slots()[0].state().track_id(), Some(1));
    }

    #[test]
    fn test_sparse_declarations() {
        let decls = vec![SlotDeclaration::new(4), SlotDeclaration::labeled(2, "Bedroom")];
        let mut mgr = TrackManager::new(&decls, TrackerConfig::default(), FallConfig::default());
        assert_eq!(mgr.slots()[0].id(), slot(2));
        assert_eq!(mgr.slots()[0].label(), "Bedroom");

        let outcome = mgr.update(&[det(1, 0.0), det(2, 0.0), det(3, 0.0)], 5);
        assert_eq!(outcome.bound, vec![slot(2), slot(4)]);
        assert_eq!(outcome.dropped_no_slot, 1);
    }

    #[test]
    fn test_fall_reported_in_outcome() {
        let mut mgr = manager();
        let falling = |z: f32, vz: f32| {
            let mut d = det(6, 0.0);
            d.detection.position.z = z;
            d.detection.velocity.z = vz;
            d
        };
        mgr.update(&[falling(1.5, 0.0)], 5);
        mgr.update(&[falling(0.9, -1.8)], 5);
        mgr.update(&[falling(0.3, -1.2)], 5);
        mgr.update(&[falling(0.2, 0.0)], 5);
        let outcome = mgr.update(&[falling(0.2, 0.0)], 5);

        assert_eq!(outcome.falls, vec![slot(1)]);
        assert!(mgr.slots()[0].is_fallen());
    }
}
