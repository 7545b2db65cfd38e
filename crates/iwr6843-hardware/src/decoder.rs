//! Streaming frame decoder.
//!
//! Accepts bytes in arbitrary chunks as they arrive from the transport and
//! yields complete frames. Malformed data is never surfaced as an error:
//! the decoder drops it, counts it in [`DecodeStats`] and resynchronizes on
//! the next magic word.
//!
//! The buffer stays bounded. Without a magic word only the last seven bytes
//! (a possible partial magic word) are kept; with one, at most
//! `max_frame_size` bytes are held while waiting for the rest of the frame.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::frame::{
    DecodedFrame, FrameHeader, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, MAGIC_WORD,
    MAX_FRAME_SIZE_LIMIT,
};
use crate::tlv::parse_tlvs;

/// Decoder limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Largest `total_packet_len` accepted before the header is treated as corrupt.
    pub max_frame_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Running decoder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    /// Bytes discarded while scanning for a magic word.
    pub bytes_skipped: u64,
    pub corrupt_tlvs: u64,
    /// Well-formed sections of a type the decoder does not interpret.
    pub tlvs_skipped: u64,
    pub records_skipped: u64,
}

/// Incremental decoder over a growing byte buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    config: DecoderConfig,
    buffer: Vec<u8>,
    stats: DecodeStats,
}

impl FrameDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            buffer: Vec::with_capacity(config.max_frame_size.min(MAX_FRAME_SIZE_LIMIT)),
            stats: DecodeStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DecoderConfig::default())
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Append freshly received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Discard all buffered bytes (used when the sensor is reset).
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Try to extract the next complete frame.
    ///
    /// Returns `None` when more bytes are needed. `ceiling_height_cm` is the
    /// sensor mounting height used to make z floor-relative.
    pub fn next_frame(&mut self, ceiling_height_cm: f32) -> Option<DecodedFrame> {
        loop {
            let Some(start) = find_magic(&self.buffer, 0) else {
                let keep = self.buffer.len().min(MAGIC_WORD.len() - 1);
                self.skip(self.buffer.len() - keep);
                return None;
            };
            if start > 0 {
                tracing::trace!(skipped = start, "Resynchronized on magic word");
                self.skip(start);
            }

            if self.buffer.len() < FRAME_HEADER_SIZE {
                return None;
            }

            let header = match FrameHeader::parse(&self.buffer) {
                Ok(header) => header,
                Err(e) => {
                    // Unreachable with a magic word at offset 0, but stay tolerant.
                    self.drop_frame(1, &e);
                    continue;
                }
            };

            let declared = match header.validate_length(self.config.max_frame_size) {
                Ok(len) => len,
                Err(e) => {
                    self.drop_frame(1, &e);
                    continue;
                }
            };

            let scan_end = self.buffer.len().min(declared);
            if let Some(next) = find_magic(&self.buffer[..scan_end], 1) {
                let err = ParseError::TruncatedFrame {
                    offset: next,
                    declared,
                };
                self.drop_frame(next, &err);
                continue;
            }

            if self.buffer.len() < declared {
                return None;
            }

            let frame_bytes: Vec<u8> = self.buffer.drain(..declared).collect();
            let outcome = parse_tlvs(
                &frame_bytes[FRAME_HEADER_SIZE..],
                header.num_tlvs,
                ceiling_height_cm / 100.0,
            );

            self.stats.frames_decoded += 1;
            self.stats.corrupt_tlvs += u64::from(outcome.corrupt_tlvs);
            self.stats.tlvs_skipped += u64::from(outcome.skipped_tlvs);
            self.stats.records_skipped += u64::from(outcome.skipped_records);

            tracing::debug!(
                frame = header.frame_number,
                len = declared,
                tlvs = header.num_tlvs,
                detections = outcome.detections.len(),
                "Decoded frame"
            );

            return Some(DecodedFrame {
                header,
                detections: outcome.detections,
            });
        }
    }

    /// Drain every complete frame currently buffered.
    pub fn drain_frames(&mut self, ceiling_height_cm: f32) -> Vec<DecodedFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame(ceiling_height_cm) {
            frames.push(frame);
        }
        frames
    }

    fn skip(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.buffer.drain(..count);
        self.stats.bytes_skipped += count as u64;
    }

    fn drop_frame(&mut self, advance: usize, reason: &ParseError) {
        tracing::warn!(error = %reason, "Dropping frame");
        self.stats.frames_dropped += 1;
        self.skip(advance);
    }
}

/// Decode exactly one frame from the start of `data`.
///
/// Returns the frame and the number of bytes it occupied. Unlike
/// [`FrameDecoder`], every problem is reported as a [`ParseError`].
pub fn decode_frame(
    data: &[u8],
    max_frame_size: usize,
    ceiling_height_cm: f32,
) -> Result<(DecodedFrame, usize), ParseError> {
    let header = FrameHeader::parse(data)?;
    let declared = header.validate_length(max_frame_size)?;

    if let Some(next) = find_magic(&data[..data.len().min(declared)], 1) {
        return Err(ParseError::TruncatedFrame {
            offset: next,
            declared,
        });
    }
    if data.len() < declared {
        return Err(ParseError::InsufficientData {
            needed: declared,
            got: data.len(),
        });
    }

    let outcome = parse_tlvs(
        &data[FRAME_HEADER_SIZE..declared],
        header.num_tlvs,
        ceiling_height_cm / 100.0,
    );
    Ok((
        DecodedFrame {
            header,
            detections: outcome.detections,
        },
        declared,
    ))
}

fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < MAGIC_WORD.len() || from > data.len() - MAGIC_WORD.len() {
        return None;
    }
    data[from..]
        .windows(MAGIC_WORD.len())
        .position(|w| w == MAGIC_WORD)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameBuilder, TargetRecord, Vec3};
    use approx::assert_relative_eq;

    fn person_frame(frame_number: u32, id: u32, z: f32) -> Vec<u8> {
        FrameBuilder::new(frame_number)
            .targets(&[TargetRecord {
                track_id: id,
                position: Vec3::new(0.5, 1.0, z),
                confidence: 1.0,
                ..TargetRecord::default()
            }])
            .build()
    }

    #[test]
    fn test_decodes_single_frame() {
        let mut decoder = FrameDecoder::with_defaults();
        decoder.push(&person_frame(1, 3, -1.9));

        let frame = decoder.next_frame(290.0).unwrap();
        assert_eq!(frame.header.frame_number, 1);
        assert_eq!(frame.detections.len(), 1);
        assert_eq!(frame.detections[0].track_id, 3);
        assert_relative_eq!(frame.detections[0].position.z, 1.0, epsilon = 1e-5);
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.stats().frames_decoded, 1);
    }

    #[test]
    fn test_uninterpreted_tlvs_counted() {
        let bytes = FrameBuilder::new(4)
            .raw_tlv(6, vec![0u8; 16])
            .targets(&[TargetRecord {
                track_id: 2,
                confidence: 1.0,
                ..TargetRecord::default()
            }])
            .raw_tlv(7, vec![0u8; 8])
            .build();
        let mut decoder = FrameDecoder::with_defaults();
        decoder.push(&bytes);

        let frame = decoder.next_frame(290.0).unwrap();
        assert_eq!(frame.detections.len(), 1);
        assert_eq!(decoder.stats().tlvs_skipped, 2);
        assert_eq!(decoder.stats().corrupt_tlvs, 0);
    }

    #[test]
    fn test_waits_for_partial_frame() {
        let bytes = person_frame(2, 1, 0.0);
        let mut decoder = FrameDecoder::with_defaults();

        decoder.push(&bytes[..30]);
        assert!(decoder.next_frame(0.0).is_none());
        decoder.push(&bytes[30..70]);
        assert!(decoder.next_frame(0.0).is_none());
        decoder.push(&bytes[70..]);

        let frame = decoder.next_frame(0.0).unwrap();
        assert_eq!(frame.header.frame_number, 2);
        assert_eq!(decoder.stats().frames_dropped, 0);
    }

    #[test]
    fn test_resyncs_after_garbage() {
        let mut decoder = FrameDecoder::with_defaults();
        decoder.push(&[0xFF, 0x00, 0x02, 0x01, 0x04]);
        decoder.push(&person_frame(9, 1, 0.0));

        let frame = decoder.next_frame(0.0).unwrap();
        assert_eq!(frame.header.frame_number, 9);
        assert_eq!(decoder.stats().bytes_skipped, 5);
    }

    #[test]
    fn test_stream_without_magic_stays_bounded() {
        let mut decoder = FrameDecoder::with_defaults();
        for _ in 0..100 {
            decoder.push(&[0x55; 1000]);
            assert!(decoder.next_frame(0.0).is_none());
        }
        assert!(decoder.buffered() < MAGIC_WORD.len());
        assert_eq!(decoder.stats().frames_decoded, 0);
    }

    #[test]
    fn test_oversized_length_is_dropped_and_resynced() {
        let mut bad = person_frame(1, 1, 0.0);
        bad[12..16].copy_from_slice(&50_000u32.to_le_bytes());

        let mut decoder = FrameDecoder::with_defaults();
        decoder.push(&bad);
        decoder.push(&person_frame(2, 1, 0.0));

        let frame = decoder.next_frame(0.0).unwrap();
        assert_eq!(frame.header.frame_number, 2);
        assert_eq!(decoder.stats().frames_dropped, 1);
    }

    #[test]
    fn test_truncated_frame_discarded_when_next_magic_arrives() {
        let full = person_frame(1, 1, 0.0);
        let mut decoder = FrameDecoder::with_defaults();
        // First frame cut short; the next frame follows immediately.
        decoder.push(&full[..60]);
        decoder.push(&person_frame(2, 7, 0.0));

        let frames = decoder.drain_frames(0.0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.frame_number, 2);
        assert_eq!(frames[0].detections[0].track_id, 7);
        assert_eq!(decoder.stats().frames_dropped, 1);
    }

    #[test]
    fn test_drain_multiple_frames() {
        let mut decoder = FrameDecoder::with_defaults();
        let mut stream = person_frame(1, 1, 0.0);
        stream.extend(person_frame(2, 1, 0.0));
        stream.extend(person_frame(3, 1, 0.0));
        decoder.push(&stream);

        let numbers: Vec<u32> = decoder
            .drain_frames(0.0)
            .iter()
            .map(|f| f.header.frame_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_clear_discards_buffer() {
        let bytes = person_frame(1, 1, 0.0);
        let mut decoder = FrameDecoder::with_defaults();
        decoder.push(&bytes[..50]);
        decoder.clear();
        decoder.push(&bytes[50..]);

        assert!(decoder.next_frame(0.0).is_none());
    }

    #[test]
    fn test_decode_frame_one_shot() {
        let bytes = person_frame(4, 2, -2.9);
        let (frame, consumed) = decode_frame(&bytes, DEFAULT_MAX_FRAME_SIZE, 290.0).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_relative_eq!(frame.detections[0].position.z, 0.0, epsilon = 1e-5);

        let short = decode_frame(&bytes[..bytes.len() - 1], DEFAULT_MAX_FRAME_SIZE, 0.0);
        assert!(matches!(short, Err(ParseError::InsufficientData { .. })));
    }

    #[test]
    fn test_empty_frame_yields_no_detections() {
        let mut decoder = FrameDecoder::with_defaults();
        decoder.push(&FrameBuilder::new(11).build());
        let frame = decoder.next_frame(290.0).unwrap();
        assert!(frame.detections.is_empty());
    }
}
