//! The closed set of runtime-tunable parameters.
//!
//! Each [`Parameter`] knows its name, its accepted range and how to read and
//! write itself on a [`ComponentConfig`]. Updates are validated before
//! anything is written, so a rejected update leaves the configuration as it
//! was. Values are never clamped.

use std::fmt;
use std::str::FromStr;

use crate::config::{Axis, Bound, ComponentConfig, VolumeKind};
use crate::error::ConfigError;

/// Ceiling height range in centimeters.
pub const CEILING_HEIGHT_RANGE: (f32, f32) = (100.0, 500.0);

/// Track limit range.
pub const MAX_TRACKS_RANGE: (f32, f32) = (1.0, 5.0);

/// A tunable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// Sensor mounting height, centimeters.
    CeilingHeight,
    MaxTracks,
    /// One edge of one boundary volume, meters.
    Boundary {
        volume: VolumeKind,
        axis: Axis,
        bound: Bound,
    },
}

impl Parameter {
    /// Every parameter, in a stable order.
    pub fn all() -> Vec<Parameter> {
        let mut all = vec![Parameter::CeilingHeight, Parameter::MaxTracks];
        for volume in [VolumeKind::Tracking, VolumeKind::Presence] {
            for axis in Axis::ALL {
                for bound in [Bound::Min, Bound::Max] {
                    all.push(Parameter::Boundary {
                        volume,
                        axis,
                        bound,
                    });
                }
            }
        }
        all
    }

    pub fn name(&self) -> &'static str {
        use Axis::*;
        use Bound::*;
        use VolumeKind::*;
        match *self {
            Parameter::CeilingHeight => "ceiling_height",
            Parameter::MaxTracks => "max_tracks",
            Parameter::Boundary {
                volume,
                axis,
                bound,
            } => match (volume, axis, bound) {
                (Tracking, X, Min) => "tracking_x_min",
                (Tracking, X, Max) => "tracking_x_max",
                (Tracking, Y, Min) => "tracking_y_min",
                (Tracking, Y, Max) => "tracking_y_max",
                (Tracking, Z, Min) => "tracking_z_min",
                (Tracking, Z, Max) => "tracking_z_max",
                (Presence, X, Min) => "presence_x_min",
                (Presence, X, Max) => "presence_x_max",
                (Presence, Y, Min) => "presence_y_min",
                (Presence, Y, Max) => "presence_y_max",
                (Presence, Z, Min) => "presence_z_min",
                (Presence, Z, Max) => "presence_z_max",
            },
        }
    }

    /// Inclusive accepted range.
    pub fn range(&self) -> (f32, f32) {
        match self {
            Parameter::CeilingHeight => CEILING_HEIGHT_RANGE,
            Parameter::MaxTracks => MAX_TRACKS_RANGE,
            Parameter::Boundary { axis, .. } => axis.bound_range(),
        }
    }

    /// Current value on `config`.
    pub fn read(&self, config: &ComponentConfig) -> f32 {
        match *self {
            Parameter::CeilingHeight => config.ceiling_height,
            Parameter::MaxTracks => f32::from(config.max_tracks),
            Parameter::Boundary {
                volume,
                axis,
                bound,
            } => config.boundary(volume).get(axis, bound),
        }
    }

    /// Validate `value` against the range and, for boundaries, the opposite edge.
    pub fn check(&self, value: f32, config: &ComponentConfig) -> Result<(), ConfigError> {
        let (min, max) = self.range();
        if !value.is_finite() {
            return Err(ConfigError::invalid_value(self.name(), "must be finite"));
        }
        if value < min || value > max {
            return Err(ConfigError::OutOfRange {
                parameter: self.name(),
                value,
                min,
                max,
            });
        }

        match *self {
            Parameter::CeilingHeight => Ok(()),
            Parameter::MaxTracks => {
                if value.fract() != 0.0 {
                    return Err(ConfigError::NotInteger {
                        parameter: self.name(),
                        value,
                    });
                }
                Ok(())
            }
            Parameter::Boundary {
                volume,
                axis,
                bound,
            } => {
                let boundary = config.boundary(volume);
                let (lo, hi) = match bound {
                    Bound::Min => (value, boundary.get(axis, Bound::Max)),
                    Bound::Max => (boundary.get(axis, Bound::Min), value),
                };
                if lo > hi {
                    return Err(ConfigError::InvertedBounds {
                        parameter: self.name(),
                        axis: axis.name(),
                        value,
                        min: lo,
                        max: hi,
                    });
                }
                Ok(())
            }
        }
    }

    /// Validate and write `value`. On error `config` is untouched.
    pub fn apply(&self, config: &mut ComponentConfig, value: f32) -> Result<(), ConfigError> {
        self.check(value, config)?;
        match *self {
            Parameter::CeilingHeight => config.ceiling_height = value,
            Parameter::MaxTracks => config.max_tracks = value as u8,
            Parameter::Boundary {
                volume,
                axis,
                bound,
            } => config.boundary_mut(volume).set(axis, bound, value),
        }
        Ok(())
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parameter::all()
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownParameter(s.to_string()))
    }
}
