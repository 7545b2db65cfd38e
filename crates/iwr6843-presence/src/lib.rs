//! # IWR6843 Presence Engine
//!
//! Turns the tracked-target stream of a ceiling-mounted IWR6843 radar into
//! per-person outputs: coordinates, vertical velocity, presence and falls.
//!
//! ## Data flow
//!
//! ```text
//! TransportPort ─▶ FrameDecoder ─▶ boundary filter ─▶ TrackManager ─▶ Publisher
//!                        ▲               ▲                  ▲
//!                        └── ceiling ────┴── ComponentConfig┘
//! ```
//!
//! Everything runs from [`Engine::poll`] on a single thread. Parameter
//! updates, resets and flash-mode changes are either applied directly on the
//! engine or queued through a [`ControlHandle`] and applied before the next
//! frame cycle.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Instant;
//! use iwr6843_hardware::adapter::MemoryTransport;
//! use iwr6843_presence::{DriverConfig, Engine, OutputKind, OutputValue, SlotId};
//!
//! let mut engine = Engine::new(DriverConfig::default(), MemoryTransport::new()).unwrap();
//! engine
//!     .register_output(SlotId::new(1).unwrap(), OutputKind::Presence, |v: OutputValue| {
//!         println!("person 1 presence: {v}");
//!     })
//!     .unwrap();
//! engine.poll(Instant::now()).unwrap();
//! ```

pub mod boundary;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod parameter;
pub mod publisher;
pub mod tracking;

pub use config::{
    Axis, Bound, BoundaryVolume, ComponentConfig, DriverConfig, OutputUnit, SlotDeclaration,
    VolumeKind,
};
pub use control::{ControlHandle, ControlRequest};
pub use engine::{Engine, EngineStats, PollSummary};
pub use error::{ConfigError, DriverError};
pub use parameter::Parameter;
pub use publisher::{OutputChannel, OutputKind, OutputValue, Publisher};
pub use tracking::{
    CycleOutcome, FallConfig, PersonSlot, SlotId, SlotSnapshot, SlotState, TrackManager,
    TrackerConfig,
};
