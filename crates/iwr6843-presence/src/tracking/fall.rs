//! Debounced per-slot fall detector.
//!
//! A fall is raised when a track's height stays below `fall_height` for
//! `confirm_frames` consecutive updates, the track was above `fall_height`
//! no more than `window_frames` frames before, and (when configured) the
//! vertical velocity reached `descent_velocity` during the drop. The flag
//! latches until the height recovers above `recover_height`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fall detection thresholds. Heights are floor-relative meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallConfig {
    /// Height below which a track counts as on the floor (default: 0.5)
    pub fall_height: f32,
    /// Height a fallen track must reach to clear the flag (default: 0.8)
    pub recover_height: f32,
    /// Consecutive low updates required to confirm (default: 3)
    pub confirm_frames: u32,
    /// Max frames between last high sample and confirmation (default: 20)
    pub window_frames: u32,
    /// Required vertical velocity in m/s, `None` to ignore (default: -1.0)
    pub descent_velocity: Option<f32>,
}

impl Default for FallConfig {
    fn default() -> Self {
        Self {
            fall_height: 0.5,
            recover_height: 0.8,
            confirm_frames: 3,
            window_frames: 20,
            descent_velocity: Some(-1.0),
        }
    }
}

impl FallConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fall_height.is_finite() || !self.recover_height.is_finite() {
            return Err(ConfigError::invalid_value("fall", "heights must be finite"));
        }
        if self.recover_height < self.fall_height {
            return Err(ConfigError::invalid_value(
                "fall.recover_height",
                "must be >= fall_height",
            ));
        }
        if self.confirm_frames == 0 {
            return Err(ConfigError::invalid_value("fall.confirm_frames", "must be > 0"));
        }
        if self.window_frames < self.confirm_frames {
            return Err(ConfigError::invalid_value(
                "fall.window_frames",
                "must be >= confirm_frames",
            ));
        }
        if let Some(v) = self.descent_velocity {
            if !v.is_finite() || v > 0.0 {
                return Err(ConfigError::invalid_value(
                    "fall.descent_velocity",
                    "must be a finite negative speed",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FallDetector {
    below_count: u32,
    last_above_cycle: Option<u64>,
    min_velocity: f32,
    fallen: bool,
}

impl FallDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fallen(&self) -> bool {
        self.fallen
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed one height / vertical-velocity sample. Returns `true` on the
    /// update that raises the flag.
    pub fn update(&mut self, z: f32, vz: f32, cycle: u64, config: &FallConfig) -> bool {
        if z >= config.fall_height {
            self.below_count = 0;
            self.min_velocity = vz;
            self.last_above_cycle = Some(cycle);
            if self.fallen && z >= config.recover_height {
                self.fallen = false;
            }
            return false;
        }

        self.below_count = self.below_count.saturating_add(1);
        self.min_velocity = self.min_velocity.min(vz);

        if self.fallen || self.below_count < config.confirm_frames {
            return false;
        }

        let recent = self
            .last_above_cycle
            .map_or(false, |c| cycle.saturating_sub(c) <= u64::from(config.window_frames));
        let fast = config
            .descent_velocity
            .map_or(true, |limit| self.min_velocity <= limit);

        if recent && fast {
            self.fallen = true;
        }
        self.fallen
    }
}
