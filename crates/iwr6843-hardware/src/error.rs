//! Error types for frame decoding, transports and control lines.

use thiserror::Error;

/// Errors that can occur when decoding an IWR6843 frame from raw bytes.
///
/// The streaming [`FrameDecoder`](crate::FrameDecoder) never surfaces these to
/// its caller: it counts them and resynchronizes. They are returned by the
/// one-shot parsing functions ([`FrameHeader::parse`](crate::FrameHeader::parse),
/// [`decode_frame`](crate::decode_frame)).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Not enough bytes in the buffer to parse the requested structure.
    #[error("Insufficient data: need {needed} bytes, got {got}")]
    InsufficientData {
        needed: usize,
        got: usize,
    },

    /// The buffer does not start with the 8-byte magic word.
    #[error("Invalid magic word: got {got:02x?}")]
    InvalidMagic {
        got: [u8; 8],
    },

    /// The header declares a total packet length outside the accepted range.
    #[error("Invalid frame length: {declared} bytes (accepted {min}..={max})")]
    InvalidFrameLength {
        declared: usize,
        min: usize,
        max: usize,
    },

    /// Another magic word starts inside the declared frame span, so the
    /// declared length does not match the bytes the sensor actually sent.
    #[error("Truncated frame: next magic word at offset {offset}, declared length {declared}")]
    TruncatedFrame {
        offset: usize,
        declared: usize,
    },

    /// A TLV declares a payload that runs past the end of the frame.
    #[error("TLV at offset {offset} overruns frame: declares {declared} bytes, {available} available")]
    TlvOverrun {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// Generic byte-level parse error.
    #[error("Parse error at offset {offset}: {message}")]
    ByteError {
        offset: usize,
        message: String,
    },
}

/// Errors raised by a byte or command transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying device reported an I/O failure.
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport is not connected or has been closed.
    #[error("Transport disconnected: {0}")]
    Disconnected(String),

    /// A chip-select or other framing line could not be driven.
    #[error("Transport line error: {0}")]
    Line(#[from] GpioError),

    /// Bus-level failure reported by an SPI or UART peripheral.
    #[error("Bus error: {0}")]
    Bus(String),
}

/// Errors raised when driving a GPIO control line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("GPIO line `{line}` failed: {reason}")]
pub struct GpioError {
    /// Name of the line (e.g. `nrst`, `sop2`, `cs`).
    pub line: String,
    /// Human-readable failure description.
    pub reason: String,
}

impl GpioError {
    /// Creates a new GPIO error for the named line.
    pub fn new(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the sensor control sequence (reset, flash mode, command push).
#[derive(Debug, Error)]
pub enum ControlError {
    /// A control line could not be driven.
    #[error("Control line error: {0}")]
    Gpio(#[from] GpioError),

    /// The command port failed while sending the sensor profile.
    #[error("Command transport error: {0}")]
    Transport(#[from] TransportError),
}
