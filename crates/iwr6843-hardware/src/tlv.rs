//! TLV section parsing.
//!
//! Only two TLV types are interpreted: the tracked-target list and the
//! track-count. Every other section is skipped using its declared length.
//!
//! # Tracked-Target Record (68 bytes)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Track ID (u32)
//! 4       12    Position x, y, z (f32, meters, sensor-relative z)
//! 16      12    Velocity x, y, z (f32, m/s)
//! 28      12    Acceleration x, y, z (f32, m/s^2)
//! 40      4     Gating gain (f32)
//! 44      4     Confidence (f32)
//! 48      20    Reserved
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::ParseError;
use crate::frame::{Detection, Vec3, TLV_HEADER_SIZE};

/// Wire size of one tracked-target record.
pub const TRACKED_TARGET_RECORD_SIZE: usize = 68;

/// TLV section types emitted by the people-tracking firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlvType {
    DetectedPoints,
    TargetList,
    TargetIndex,
    PointCloud,
    TargetHeight,
    TrackedTargets,
    CompressedSphericalPoints,
    /// Number of records in the tracked-target section of the same frame.
    TrackCount,
    Unknown(u32),
}

impl TlvType {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::DetectedPoints,
            2 => Self::TargetList,
            3 => Self::TargetIndex,
            6 => Self::PointCloud,
            7 => Self::TargetHeight,
            8 => Self::TrackedTargets,
            9 => Self::CompressedSphericalPoints,
            10 => Self::TrackCount,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::DetectedPoints => 1,
            Self::TargetList => 2,
            Self::TargetIndex => 3,
            Self::PointCloud => 6,
            Self::TargetHeight => 7,
            Self::TrackedTargets => 8,
            Self::CompressedSphericalPoints => 9,
            Self::TrackCount => 10,
            Self::Unknown(code) => *code,
        }
    }
}

/// What came out of the TLV section of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlvOutcome {
    pub detections: Vec<Detection>,
    /// Sections that overran the frame or disagreed with the track count.
    pub corrupt_tlvs: u32,
    /// Sections skipped because their type is not interpreted.
    pub skipped_tlvs: u32,
    /// Target records dropped for carrying non-finite values.
    pub skipped_records: u32,
}

/// Parse up to `num_tlvs` sections from a frame payload (the bytes after the header).
///
/// `ceiling_offset_m` is added to every target's z so that reported heights
/// are relative to the floor.
pub fn parse_tlvs(payload: &[u8], num_tlvs: u32, ceiling_offset_m: f32) -> TlvOutcome {
    let mut outcome = TlvOutcome::default();
    let mut target_sections: Vec<&[u8]> = Vec::new();
    let mut track_count: Option<u32> = None;
    let mut offset = 0usize;
    let mut seen = 0u32;

    while seen < num_tlvs && offset + TLV_HEADER_SIZE <= payload.len() {
        let tlv_type = LittleEndian::read_u32(&payload[offset..offset + 4]);
        let declared = LittleEndian::read_u32(&payload[offset + 4..offset + 8]) as usize;
        let body_start = offset + TLV_HEADER_SIZE;
        let available = payload.len() - body_start;

        if declared > available {
            let err = ParseError::TlvOverrun {
                offset,
                declared,
                available,
            };
            tracing::warn!(error = %err, "Dropping remaining TLVs of frame");
            outcome.corrupt_tlvs += 1;
            break;
        }

        let body = &payload[body_start..body_start + declared];
        match TlvType::from_code(tlv_type) {
            TlvType::TrackedTargets => target_sections.push(body),
            TlvType::TrackCount => match body.get(..4) {
                Some(bytes) => track_count = Some(LittleEndian::read_u32(bytes)),
                None => {
                    tracing::debug!(len = declared, "Track-count TLV too short");
                    outcome.corrupt_tlvs += 1;
                }
            },
            other => {
                tracing::trace!(tlv = ?other, len = declared, "Skipping TLV");
                outcome.skipped_tlvs += 1;
            }
        }

        offset = body_start + declared;
        seen += 1;
    }

    let total_records: usize = target_sections
        .iter()
        .map(|s| s.len() / TRACKED_TARGET_RECORD_SIZE)
        .sum();
    if let Some(expected) = track_count {
        if expected as usize != total_records {
            tracing::warn!(
                expected,
                found = total_records,
                "Track count mismatch; discarding target list"
            );
            outcome.corrupt_tlvs += target_sections.len() as u32;
            return outcome;
        }
    }

    for section in target_sections {
        for record in section.chunks_exact(TRACKED_TARGET_RECORD_SIZE) {
            match decode_target(record, ceiling_offset_m) {
                Ok(detection) => outcome.detections.push(detection),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping target record");
                    outcome.skipped_records += 1;
                }
            }
        }
    }

    outcome
}

/// Decode one 68-byte tracked-target record.
pub fn decode_target(record: &[u8], ceiling_offset_m: f32) -> Result<Detection, ParseError> {
    if record.len() < TRACKED_TARGET_RECORD_SIZE {
        return Err(ParseError::InsufficientData {
            needed: TRACKED_TARGET_RECORD_SIZE,
            got: record.len(),
        });
    }

    let mut cursor = Cursor::new(record);
    let track_id = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| ParseError::ByteError {
            offset: 0,
            message: "Failed to read track ID".into(),
        })?;

    let mut floats = [0f32; 11];
    for (i, slot) in floats.iter_mut().enumerate() {
        *slot = cursor
            .read_f32::<LittleEndian>()
            .map_err(|_| ParseError::ByteError {
                offset: 4 + i * 4,
                message: "Failed to read target field".into(),
            })?;
    }

    let position = Vec3::new(floats[0], floats[1], floats[2] + ceiling_offset_m);
    let velocity = Vec3::new(floats[3], floats[4], floats[5]);
    let acceleration = Vec3::new(floats[6], floats[7], floats[8]);
    let confidence = floats[10];

    if !position.is_finite() || !velocity.is_finite() {
        return Err(ParseError::ByteError {
            offset: 4,
            message: format!("Non-finite kinematics for track {track_id}"),
        });
    }

    Ok(Detection {
        track_id,
        position,
        velocity,
        acceleration,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TargetRecord;
    use approx::assert_relative_eq;

    fn tlv(tlv_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&tlv_type.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn target_payload(targets: &[TargetRecord]) -> Vec<u8> {
        // Reuse the builder's encoder and strip header + TLV header.
        let frame = crate::frame::FrameBuilder::new(0).targets(targets).build();
        frame[crate::frame::FRAME_HEADER_SIZE + TLV_HEADER_SIZE..].to_vec()
    }

    fn person(id: u32, x: f32, y: f32, z: f32) -> TargetRecord {
        TargetRecord {
            track_id: id,
            position: Vec3::new(x, y, z),
            velocity: Vec3::new(0.1, 0.0, -0.2),
            confidence: 0.9,
            ..TargetRecord::default()
        }
    }

    #[test]
    fn test_tlv_type_codes() {
        assert_eq!(TlvType::from_code(8), TlvType::TrackedTargets);
        assert_eq!(TlvType::from_code(10), TlvType::TrackCount);
        assert_eq!(TlvType::from_code(1020), TlvType::Unknown(1020));
        assert_eq!(TlvType::Unknown(1020).code(), 1020);
    }

    #[test]
    fn test_decode_target_applies_ceiling_offset() {
        let payload = target_payload(&[person(4, 1.0, -2.0, -2.4)]);
        let det = decode_target(&payload, 2.9).unwrap();

        assert_eq!(det.track_id, 4);
        assert_relative_eq!(det.position.x, 1.0);
        assert_relative_eq!(det.position.y, -2.0);
        assert_relative_eq!(det.position.z, 0.5, epsilon = 1e-5);
        assert_relative_eq!(det.velocity.z, -0.2);
        assert_relative_eq!(det.confidence, 0.9);
    }

    #[test]
    fn test_unknown_tlv_skipped_by_length() {
        let mut payload = tlv(1020, &[0xAB; 13]);
        payload.extend(tlv(8, &target_payload(&[person(1, 0.0, 0.0, 0.0)])));

        let outcome = parse_tlvs(&payload, 2, 0.0);
        assert_eq!(outcome.skipped_tlvs, 1);
        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(outcome.corrupt_tlvs, 0);
    }

    #[test]
    fn test_overrun_keeps_earlier_sections() {
        let mut payload = tlv(8, &target_payload(&[person(2, 0.5, 0.5, 0.0)]));
        // Declares 500 bytes but only 4 follow.
        payload.extend_from_slice(&8u32.to_le_bytes());
        payload.extend_from_slice(&500u32.to_le_bytes());
        payload.extend_from_slice(&[0u8; 4]);

        let outcome = parse_tlvs(&payload, 2, 0.0);
        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(outcome.corrupt_tlvs, 1);
    }

    #[test]
    fn test_track_count_mismatch_discards_targets() {
        let mut payload = tlv(10, &3u32.to_le_bytes());
        payload.extend(tlv(8, &target_payload(&[person(1, 0.0, 0.0, 0.0)])));

        let outcome = parse_tlvs(&payload, 2, 0.0);
        assert!(outcome.detections.is_empty());
        assert_eq!(outcome.corrupt_tlvs, 1);
    }

    #[test]
    fn test_track_count_match_keeps_targets() {
        let mut payload = tlv(8, &target_payload(&[
            person(1, 0.0, 0.0, 0.0),
            person(2, 1.0, 1.0, 1.0),
        ]));
        payload.extend(tlv(10, &2u32.to_le_bytes()));

        let outcome = parse_tlvs(&payload, 2, 0.0);
        assert_eq!(outcome.detections.len(), 2);
        assert_eq!(outcome.detections[1].track_id, 2);
    }

    #[test]
    fn test_non_finite_record_skipped() {
        let payload = tlv(8, &target_payload(&[
            person(1, f32::NAN, 0.0, 0.0),
            person(2, 0.0, 0.0, 0.0),
        ]));

        let outcome = parse_tlvs(&payload, 1, 0.0);
        assert_eq!(outcome.skipped_records, 1);
        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(outcome.detections[0].track_id, 2);
    }

    #[test]
    fn test_num_tlvs_limits_parsing() {
        let mut payload = tlv(8, &target_payload(&[person(1, 0.0, 0.0, 0.0)]));
        payload.extend(tlv(8, &target_payload(&[person(2, 0.0, 0.0, 0.0)])));

        let outcome = parse_tlvs(&payload, 1, 0.0);
        assert_eq!(outcome.detections.len(), 1);
    }
}
