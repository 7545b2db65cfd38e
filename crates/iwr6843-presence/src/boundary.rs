//! Boundary filter: classify detections against the tracking and presence volumes.

use iwr6843_hardware::Detection;

use crate::config::{BoundaryVolume, ComponentConfig};

/// Where a detection falls relative to the two volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub inside_tracking: bool,
    pub inside_presence: bool,
}

/// A detection that passed the tracking volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetainedDetection {
    pub detection: Detection,
    pub inside_presence: bool,
}

/// Classify a single detection.
///
/// The two volumes are independent. A presence volume that is not contained
/// in the tracking volume is accepted as configured.
pub fn classify(
    detection: &Detection,
    tracking: &BoundaryVolume,
    presence: &BoundaryVolume,
) -> Classification {
    Classification {
        inside_tracking: tracking.contains(&detection.position),
        inside_presence: presence.contains(&detection.position),
    }
}

/// Keep the detections inside the tracking volume, in input order.
pub fn retain(detections: &[Detection], config: &ComponentConfig) -> Vec<RetainedDetection> {
    detections
        .iter()
        .filter_map(|d| {
            let c = classify(d, &config.tracking_boundary, &config.presence_boundary);
            if !c.inside_tracking {
                tracing::debug!(
                    track = d.track_id,
                    x = d.position.x,
                    y = d.position.y,
                    z = d.position.z,
                    "Detection outside tracking boundary"
                );
                return None;
            }
            Some(RetainedDetection {
                detection: *d,
                inside_presence: c.inside_presence,
            })
        })
        .collect()
}
