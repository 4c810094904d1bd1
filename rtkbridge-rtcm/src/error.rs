//! Decoder error types.

use thiserror::Error;

/// Conditions that make the decoder drop the frame it was collecting.
///
/// These never leave the decoding path: the pipeline logs them and returns
/// to hunting for the next preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("RTCM length error: declared {declared} bytes (max {max})")]
    LengthInvalid { declared: usize, max: usize },

    #[error("RTCM CRC error: expected {expected:#08x}, got {actual:#08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("RTCM buffer overflow at {index} bytes - discarding corrupted data")]
    BufferOverflow { index: usize },
}

impl DecodeError {
    /// Short stable label, used as a log field and by the CLI summary.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::LengthInvalid { .. } => "length_invalid",
            DecodeError::CrcMismatch { .. } => "crc_mismatch",
            DecodeError::BufferOverflow { .. } => "buffer_overflow",
        }
    }
}
