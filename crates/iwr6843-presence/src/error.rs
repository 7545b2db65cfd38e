//! Error types for the presence engine.
//!
//! ```text
//! DriverError
//! ├── ConfigError     (validation, parameter updates, file loading)
//! ├── TransportError  (data transport reads)
//! └── ControlError    (reset / flash / command lines)
//! ```

use std::path::PathBuf;

use iwr6843_hardware::{ControlError, TransportError};
use thiserror::Error;

/// Top-level error returned by [`Engine`](crate::Engine) operations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A transport read failed. The engine retries on the next poll.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Sensor control error: {0}")]
    Control(#[from] ControlError),

    /// The engine behind a [`ControlHandle`](crate::ControlHandle) was dropped.
    #[error("Control channel closed")]
    ControlClosed,

    /// The control queue already holds `capacity` pending requests.
    #[error("Control queue full ({capacity} pending requests)")]
    ControlQueueFull { capacity: usize },
}

/// Errors produced when validating configuration or applying a parameter update.
///
/// A rejected update never modifies the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    /// A parameter value lies outside its accepted range.
    #[error("`{parameter}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        parameter: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// An integer parameter was given a fractional value.
    #[error("`{parameter}` must be an integer, got {value}")]
    NotInteger {
        parameter: &'static str,
        value: f32,
    },

    /// The update would leave a boundary with min greater than max.
    #[error("`{parameter}` = {value} would invert the {axis} bounds (min {min}, max {max})")]
    InvertedBounds {
        parameter: &'static str,
        axis: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// No parameter has this name.
    #[error("Unknown parameter `{0}`")]
    UnknownParameter(String),

    /// A configuration file could not be read or written.
    #[error("Cannot access config file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
