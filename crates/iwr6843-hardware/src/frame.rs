//! Frame header and detection types for the IWR6843 output stream.
//!
//! # Frame Layout
//!
//! Every frame starts with a 40-byte little-endian header, followed by
//! `num_tlvs` type-length-value sections:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     Magic word 02 01 04 03 06 05 08 07
//! 8       4     Version
//! 12      4     Total packet length (header included)
//! 16      4     Platform
//! 20      4     Frame number
//! 24      4     Time (CPU cycles)
//! 28      4     Number of detected objects
//! 32      4     Number of TLVs
//! 36      4     Sub-frame number
//! 40      N     TLV sections (type u32, length u32, payload)
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::ParseError;
use crate::tlv::{TlvType, TRACKED_TARGET_RECORD_SIZE};

/// Frame synchronization pattern emitted by the sensor before every header.
pub const MAGIC_WORD: [u8; 8] = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07];

/// Size of the fixed frame header, magic word included.
pub const FRAME_HEADER_SIZE: usize = 40;

/// Size of a TLV section header (type + length).
pub const TLV_HEADER_SIZE: usize = 8;

/// Largest frame the decoder accepts by default.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10_000;

/// Upper limit for a configured maximum frame size (64 KiB).
pub const MAX_FRAME_SIZE_LIMIT: usize = 64 * 1024;

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub version: u32,
    /// Total frame length in bytes, header included.
    pub total_packet_len: u32,
    pub platform: u32,
    pub frame_number: u32,
    pub time_cpu_cycles: u32,
    pub num_detected_obj: u32,
    pub num_tlvs: u32,
    pub subframe_number: u32,
}

impl FrameHeader {
    /// Parse a header from a buffer that starts at the magic word.
    ///
    /// Only the structure is checked here; the declared length is validated
    /// by [`FrameHeader::validate_length`].
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(ParseError::InsufficientData {
                needed: FRAME_HEADER_SIZE,
                got: data.len(),
            });
        }

        if data[..MAGIC_WORD.len()] != MAGIC_WORD {
            let mut got = [0u8; 8];
            got.copy_from_slice(&data[..MAGIC_WORD.len()]);
            return Err(ParseError::InvalidMagic { got });
        }

        let mut cursor = Cursor::new(&data[MAGIC_WORD.len()..FRAME_HEADER_SIZE]);
        let mut field = |name: &str, offset: usize| {
            cursor.read_u32::<LittleEndian>().map_err(|_| ParseError::ByteError {
                offset,
                message: format!("Failed to read {name}"),
            })
        };

        Ok(Self {
            version: field("version", 8)?,
            total_packet_len: field("total packet length", 12)?,
            platform: field("platform", 16)?,
            frame_number: field("frame number", 20)?,
            time_cpu_cycles: field("time", 24)?,
            num_detected_obj: field("detected object count", 28)?,
            num_tlvs: field("TLV count", 32)?,
            subframe_number: field("sub-frame number", 36)?,
        })
    }

    /// Check the declared total length against `[FRAME_HEADER_SIZE, max_frame_size]`.
    pub fn validate_length(&self, max_frame_size: usize) -> Result<usize, ParseError> {
        let declared = self.total_packet_len as usize;
        if declared < FRAME_HEADER_SIZE || declared > max_frame_size {
            return Err(ParseError::InvalidFrameLength {
                declared,
                min: FRAME_HEADER_SIZE,
                max: max_frame_size,
            });
        }
        Ok(declared)
    }

    /// Encode the header, magic word included.
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        out[..MAGIC_WORD.len()].copy_from_slice(&MAGIC_WORD);
        let fields = [
            self.version,
            self.total_packet_len,
            self.platform,
            self.frame_number,
            self.time_cpu_cycles,
            self.num_detected_obj,
            self.num_tlvs,
            self.subframe_number,
        ];
        for (i, value) in fields.iter().enumerate() {
            let start = MAGIC_WORD.len() + i * 4;
            LittleEndian::write_u32(&mut out[start..start + 4], *value);
        }
        out
    }
}

/// A 3-D vector in meters (or meters per second for velocities).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// True when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One tracked target reported by the sensor in a single frame.
///
/// Positions are normalised to meters at decode time; `position.z` is
/// floor-relative (the ceiling correction has already been applied).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Sensor-assigned track ID. Transient: the sensor may reuse it.
    pub track_id: u32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    /// Tracker confidence as reported by the sensor.
    pub confidence: f32,
}

/// The result of decoding one complete frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedFrame {
    pub header: FrameHeader,
    pub detections: Vec<Detection>,
}

/// Raw tracked-target record as emitted on the wire (sensor-relative z).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetRecord {
    pub track_id: u32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub gating_gain: f32,
    pub confidence: f32,
}

/// Builds wire-format frames, for simulators and stream replay tests.
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    frame_number: u32,
    tlvs: Vec<(u32, Vec<u8>)>,
}

impl FrameBuilder {
    pub fn new(frame_number: u32) -> Self {
        Self {
            frame_number,
            tlvs: Vec::new(),
        }
    }

    /// Append a tracked-target TLV carrying `targets`.
    pub fn targets(mut self, targets: &[TargetRecord]) -> Self {
        let mut payload = Vec::with_capacity(targets.len() * TRACKED_TARGET_RECORD_SIZE);
        for t in targets {
            encode_target(&mut payload, t);
        }
        self.tlvs.push((TlvType::TrackedTargets.code(), payload));
        self
    }

    /// Append a track-count TLV.
    pub fn track_count(mut self, count: u32) -> Self {
        self.tlvs.push((TlvType::TrackCount.code(), count.to_le_bytes().to_vec()));
        self
    }

    /// Append an arbitrary TLV section.
    pub fn raw_tlv(mut self, tlv_type: u32, payload: Vec<u8>) -> Self {
        self.tlvs.push((tlv_type, payload));
        self
    }

    /// Encode the frame, computing the header length and TLV count.
    pub fn build(self) -> Vec<u8> {
        let body_len: usize = self
            .tlvs
            .iter()
            .map(|(_, payload)| TLV_HEADER_SIZE + payload.len())
            .sum();
        let header = FrameHeader {
            version: 0x0306_0000,
            total_packet_len: (FRAME_HEADER_SIZE + body_len) as u32,
            platform: 0x000A_6843,
            frame_number: self.frame_number,
            time_cpu_cycles: 0,
            num_detected_obj: 0,
            num_tlvs: self.tlvs.len() as u32,
            subframe_number: 0,
        };

        let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + body_len);
        out.extend_from_slice(&header.to_bytes());
        for (tlv_type, payload) in self.tlvs {
            out.extend_from_slice(&tlv_type.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&payload);
        }
        out
    }
}

fn encode_target(buf: &mut Vec<u8>, t: &TargetRecord) {
    let start = buf.len();
    buf.extend_from_slice(&t.track_id.to_le_bytes());
    for v in [
        t.position.x,
        t.position.y,
        t.position.z,
        t.velocity.x,
        t.velocity.y,
        t.velocity.z,
        t.acceleration.x,
        t.acceleration.y,
        t.acceleration.z,
        t.gating_gain,
        t.confidence,
    ] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.resize(start + TRACKED_TARGET_RECORD_SIZE, 0);
}
