//! Driver configuration.
//!
//! [`ComponentConfig`] holds the runtime-tunable settings (ceiling height,
//! track limit, boundary volumes, slot declarations). [`DriverConfig`] wraps it
//! together with the tracker, fall detector, decoder and output settings and
//! is what gets loaded from JSON.
//!
//! All lengths in boundary volumes are meters, floor-relative for z. The
//! ceiling height is in centimeters.

use std::path::Path;
use std::time::Duration;

use iwr6843_hardware::{DecoderConfig, Vec3, FRAME_HEADER_SIZE, MAX_FRAME_SIZE_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::parameter::Parameter;
use crate::tracking::{FallConfig, TrackerConfig, MAX_SLOTS};

/// Largest accepted `read_chunk_size`.
pub const MAX_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    /// Accepted range for any bound on this axis, in meters.
    pub fn bound_range(&self) -> (f32, f32) {
        match self {
            Axis::X | Axis::Y => (-10.0, 10.0),
            Axis::Z => (-5.0, 10.0),
        }
    }

    pub fn component(&self, v: &Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

/// Lower or upper edge of a boundary axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    Min,
    Max,
}

/// Which of the two boundary volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeKind {
    /// Outer volume; detections outside it are ignored.
    Tracking,
    /// Inner volume that sets the presence flag.
    Presence,
}

/// Axis-aligned box with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryVolume {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub z_min: f32,
    pub z_max: f32,
}

impl Default for BoundaryVolume {
    fn default() -> Self {
        Self {
            x_min: -4.0,
            x_max: 4.0,
            y_min: -4.0,
            y_max: 4.0,
            z_min: -0.5,
            z_max: 3.0,
        }
    }
}

impl BoundaryVolume {
    /// True when every coordinate of `p` lies within `[min, max]`.
    pub fn contains(&self, p: &Vec3) -> bool {
        (self.x_min..=self.x_max).contains(&p.x)
            && (self.y_min..=self.y_max).contains(&p.y)
            && (self.z_min..=self.z_max).contains(&p.z)
    }

    pub fn get(&self, axis: Axis, bound: Bound) -> f32 {
        match (axis, bound) {
            (Axis::X, Bound::Min) => self.x_min,
            (Axis::X, Bound::Max) => self.x_max,
            (Axis::Y, Bound::Min) => self.y_min,
            (Axis::Y, Bound::Max) => self.y_max,
            (Axis::Z, Bound::Min) => self.z_min,
            (Axis::Z, Bound::Max) => self.z_max,
        }
    }

    /// Raw setter. Range and ordering checks live in [`Parameter::apply`].
    pub(crate) fn set(&mut self, axis: Axis, bound: Bound, value: f32) {
        let field = match (axis, bound) {
            (Axis::X, Bound::Min) => &mut self.x_min,
            (Axis::X, Bound::Max) => &mut self.x_max,
            (Axis::Y, Bound::Min) => &mut self.y_min,
            (Axis::Y, Bound::Max) => &mut self.y_max,
            (Axis::Z, Bound::Min) => &mut self.z_min,
            (Axis::Z, Bound::Max) => &mut self.z_max,
        };
        *field = value;
    }
}

/// A declared person slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDeclaration {
    /// Slot number, 1 to 5.
    pub id: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SlotDeclaration {
    pub fn new(id: u8) -> Self {
        Self { id, label: None }
    }

    pub fn labeled(id: u8, label: impl Into<String>) -> Self {
        Self {
            id,
            label: Some(label.into()),
        }
    }

    /// Label, falling back to "Person N".
    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("Person {}", self.id))
    }
}

/// Runtime-tunable component settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Sensor mounting height above the floor, in centimeters.
    pub ceiling_height: f32,
    /// Maximum number of simultaneously bound slots.
    pub max_tracks: u8,
    pub tracking_boundary: BoundaryVolume,
    pub presence_boundary: BoundaryVolume,
    pub slots: Vec<SlotDeclaration>,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            ceiling_height: 290.0,
            max_tracks: MAX_SLOTS as u8,
            tracking_boundary: BoundaryVolume::default(),
            presence_boundary: BoundaryVolume::default(),
            slots: (1..=MAX_SLOTS as u8).map(SlotDeclaration::new).collect(),
        }
    }
}

impl ComponentConfig {
    pub fn boundary(&self, kind: VolumeKind) -> &BoundaryVolume {
        match kind {
            VolumeKind::Tracking => &self.tracking_boundary,
            VolumeKind::Presence => &self.presence_boundary,
        }
    }

    pub(crate) fn boundary_mut(&mut self, kind: VolumeKind) -> &mut BoundaryVolume {
        match kind {
            VolumeKind::Tracking => &mut self.tracking_boundary,
            VolumeKind::Presence => &mut self.presence_boundary,
        }
    }

    /// Check every tunable parameter and the slot declarations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for parameter in Parameter::all() {
            parameter.check(parameter.read(self), self)?;
        }

        if self.slots.is_empty() {
            return Err(ConfigError::invalid_value("slots", "at least one slot required"));
        }
        let mut seen = [false; MAX_SLOTS];
        for slot in &self.slots {
            if slot.id == 0 || slot.id as usize > MAX_SLOTS {
                return Err(ConfigError::invalid_value(
                    "slots",
                    format!("slot id {} outside 1..={MAX_SLOTS}", slot.id),
                ));
            }
            let idx = slot.id as usize - 1;
            if seen[idx] {
                return Err(ConfigError::invalid_value(
                    "slots",
                    format!("slot id {} declared twice", slot.id),
                ));
            }
            seen[idx] = true;
        }
        Ok(())
    }
}

/// Unit used for published coordinates and velocities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputUnit {
    #[default]
    Centimeters,
    Meters,
}

impl OutputUnit {
    /// Multiplier from meters to this unit.
    pub fn scale(&self) -> f32 {
        match self {
            OutputUnit::Centimeters => 100.0,
            OutputUnit::Meters => 1.0,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            OutputUnit::Centimeters => "cm",
            OutputUnit::Meters => "m",
        }
    }
}

/// Complete driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub component: ComponentConfig,
    pub tracker: TrackerConfig,
    pub fall: FallConfig,
    pub decoder: DecoderConfig,
    pub output_unit: OutputUnit,
    /// Release every slot when no frame arrives for this long (default: 2000).
    pub link_timeout_ms: u64,
    /// Transport reads attempted per poll (default: 16).
    pub max_reads_per_poll: usize,
    /// Size of each transport read (default: 1024).
    pub read_chunk_size: usize,
    /// Control requests that can wait between polls (default: 32).
    pub control_queue_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            component: ComponentConfig::default(),
            tracker: TrackerConfig::default(),
            fall: FallConfig::default(),
            decoder: DecoderConfig::default(),
            output_unit: OutputUnit::default(),
            link_timeout_ms: 2000,
            max_reads_per_poll: 16,
            read_chunk_size: 1024,
            control_queue_capacity: 32,
        }
    }
}

impl DriverConfig {
    /// Load and validate a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FileRead`] when the file cannot be read, otherwise the
    /// first parse or validation failure.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: DriverConfig = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::invalid_value("(file)", e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this configuration as pretty-printed JSON.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.link_timeout_ms)
    }

    /// Validate all fields, returning the first offending one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.component.validate()?;
        self.tracker.validate()?;
        self.fall.validate()?;

        let frame_size = self.decoder.max_frame_size;
        if !(FRAME_HEADER_SIZE..=MAX_FRAME_SIZE_LIMIT).contains(&frame_size) {
            return Err(ConfigError::invalid_value(
                "decoder.max_frame_size",
                format!("must be in [{FRAME_HEADER_SIZE}, {MAX_FRAME_SIZE_LIMIT}], got {frame_size}"),
            ));
        }
        if self.link_timeout_ms == 0 {
            return Err(ConfigError::invalid_value("link_timeout_ms", "must be > 0"));
        }
        if self.max_reads_per_poll == 0 {
            return Err(ConfigError::invalid_value("max_reads_per_poll", "must be > 0"));
        }
        if self.read_chunk_size == 0 || self.read_chunk_size > MAX_READ_CHUNK_SIZE {
            return Err(ConfigError::invalid_value(
                "read_chunk_size",
                format!("must be in [1, {MAX_READ_CHUNK_SIZE}], got {}", self.read_chunk_size),
            ));
        }
        if self.control_queue_capacity == 0 {
            return Err(ConfigError::invalid_value("control_queue_capacity", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = DriverConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.component.slots.len(), 5);
        assert_eq!(cfg.component.slots[2].display_label(), "Person 3");
        assert_eq!(cfg.output_unit, OutputUnit::Centimeters);
    }

    #[test]
    fn test_oversized_buffers_rejected() {
        let mut cfg = DriverConfig::default();
        cfg.decoder.max_frame_size = usize::MAX / 2;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "decoder.max_frame_size", .. })
        ));

        cfg.decoder.max_frame_size = MAX_FRAME_SIZE_LIMIT;
        cfg.validate().unwrap();

        cfg.read_chunk_size = usize::MAX;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "read_chunk_size", .. })
        ));
    }

    #[test]
    fn test_zero_control_queue_rejected() {
        let mut cfg = DriverConfig::default();
        cfg.control_queue_capacity = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "control_queue_capacity", .. })
        ));
    }

    #[test]
    fn test_from_json_huge_frame_size_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("driver.json");
        std::fs::write(&path, r#"{ "decoder": { "max_frame_size": 4611686018427387903 } }"#)
            .unwrap();
        assert!(DriverConfig::from_json(&path).is_err());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let volume = BoundaryVolume::default();
        assert!(volume.contains(&Vec3::new(4.0, -4.0, 3.0)));
        assert!(volume.contains(&Vec3::new(-4.0, 4.0, -0.5)));
        assert!(!volume.contains(&Vec3::new(4.01, 0.0, 0.0)));
        assert!(!volume.contains(&Vec3::new(0.0, 0.0, -0.51)));
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut volume = BoundaryVolume::default();
        volume.set(Axis::Y, Bound::Max, 2.5);
        assert_eq!(volume.get(Axis::Y, Bound::Max), 2.5);
        assert_eq!(volume.y_max, 2.5);
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let mut cfg = ComponentConfig::default();
        cfg.slots.push(SlotDeclaration::new(2));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "slots", .. })
        ));
    }

    #[test]
    fn test_slot_id_out_of_range_rejected() {
        let mut cfg = ComponentConfig::default();
        cfg.slots = vec![SlotDeclaration::new(6)];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_inverted_boundary_rejected() {
        let mut cfg = ComponentConfig::default();
        cfg.presence_boundary.z_min = 3.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvertedBounds { .. })));
    }

    #[test]
    fn test_from_json_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("driver.json");
        std::fs::write(
            &path,
            r#"{
                "component": {
                    "ceiling_height": 260,
                    "max_tracks": 2,
                    "slots": [{ "id": 1, "label": "Bed" }, { "id": 2 }]
                },
                "output_unit": "meters"
            }"#,
        )
        .unwrap();

        let cfg = DriverConfig::from_json(&path).unwrap();
        assert_eq!(cfg.component.ceiling_height, 260.0);
        assert_eq!(cfg.component.max_tracks, 2);
        assert_eq!(cfg.component.slots[0].display_label(), "Bed");
        assert_eq!(cfg.component.tracking_boundary, BoundaryVolume::default());
        assert_eq!(cfg.output_unit, OutputUnit::Meters);
        assert_eq!(cfg.link_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_from_json_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("driver.json");
        std::fs::write(&path, r#"{ "component": { "max_tracks": 9 } }"#).unwrap();
        assert!(matches!(
            DriverConfig::from_json(&path),
            Err(ConfigError::OutOfRange { parameter: "max_tracks", .. })
        ));
    }

    #[test]
    fn test_from_json_missing_file() {
        let dir = tempdir().unwrap();
        let result = DriverConfig::from_json(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn test_to_json_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut cfg = DriverConfig::default();
        cfg.component.presence_boundary.x_max = 1.5;
        cfg.to_json(&path).unwrap();
        assert_eq!(DriverConfig::from_json(&path).unwrap(), cfg);
    }
}
