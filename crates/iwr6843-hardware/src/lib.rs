//! # IWR6843 Hardware Interface
//!
//! Byte-level support for Texas Instruments IWR6843 mmWave radar sensors
//! running the people-tracking firmware.
//!
//! ## Scope
//!
//! - Frame header and TLV parsing into [`Detection`]s
//! - [`FrameDecoder`]: a streaming decoder that resynchronizes on the magic word
//! - Port traits for the data transport, the CLI UART and GPIO lines
//! - Memory, reader and SPI transport adapters
//! - Reset and flash-mode sequencing ([`Iwr6843Control`])
//!
//! Tracking, boundary filtering and output publishing live in the
//! `iwr6843-presence` crate.
//!
//! ## Example
//!
//! ```rust
//! use iwr6843_hardware::{FrameBuilder, FrameDecoder, TargetRecord, Vec3};
//!
//! let bytes = FrameBuilder::new(1)
//!     .targets(&[TargetRecord {
//!         track_id: 2,
//!         position: Vec3::new(0.4, 1.2, -1.8),
//!         ..TargetRecord::default()
//!     }])
//!     .build();
//!
//! let mut decoder = FrameDecoder::with_defaults();
//! decoder.push(&bytes);
//! let frame = decoder.next_frame(290.0).unwrap();
//! assert_eq!(frame.detections[0].track_id, 2);
//! ```

pub mod adapter;
pub mod control;
mod decoder;
mod error;
mod frame;
pub mod port;
pub mod profile;
mod tlv;

pub use control::{BootStatus, Iwr6843Control, NullCommandPort, ResetTiming, SensorControl};
pub use decoder::{decode_frame, DecodeStats, DecoderConfig, FrameDecoder};
pub use error::{ControlError, GpioError, ParseError, TransportError};
pub use frame::{
    DecodedFrame, Detection, FrameBuilder, FrameHeader, TargetRecord, Vec3, DEFAULT_MAX_FRAME_SIZE,
    FRAME_HEADER_SIZE, MAGIC_WORD, MAX_FRAME_SIZE_LIMIT, TLV_HEADER_SIZE,
};
pub use port::{CommandPort, Delay, OutputLine, SpiBus, StdDelay, TransportPort};
pub use tlv::{decode_target, parse_tlvs, TlvOutcome, TlvType, TRACKED_TARGET_RECORD_SIZE};
