//! RTCM3 frame layout.
//!
//! ```text
//! +----------+-----------------------+-------------------+----------+
//! | preamble | reserved | length     | payload           | CRC24Q   |
//! | 0xD3     | 6 bits   | 10 bits    | 0..=1023 bytes    | 3 bytes  |
//! +----------+-----------------------+-------------------+----------+
//! ```
//!
//! The CRC covers the header and payload and is stored big-endian.

use crate::crc24q::Crc24q;
use crate::error::DecodeError;
use crate::{CRC_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE, PREAMBLE};
use bytes::{BufMut, Bytes, BytesMut};

/// A complete, CRC-verified RTCM3 frame including header and checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    raw: Bytes,
}

impl Frame {
    /// Wraps bytes the decoder has already verified.
    pub(crate) fn from_verified(raw: Bytes) -> Self {
        debug_assert!(raw.len() >= HEADER_SIZE + CRC_SIZE);
        Self { raw }
    }

    /// Builds a well-formed frame around `payload`.
    pub fn encode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(DecodeError::LengthInvalid {
                declared: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        buf.put_u8(PREAMBLE);
        // Upper 6 bits of the length word are reserved and sent as zero.
        buf.put_u16(payload.len() as u16 & 0x03FF);
        buf.put_slice(payload);

        let crc = Crc24q::checksum(&buf);
        buf.put_u8((crc >> 16) as u8);
        buf.put_u8((crc >> 8) as u8);
        buf.put_u8(crc as u8);

        Ok(Self { raw: buf.freeze() })
    }

    /// Payload length from the low 10 bits of a 3-byte header.
    pub fn parse_length(header: &[u8]) -> usize {
        (((header[1] & 0x03) as usize) << 8) | header[2] as usize
    }

    /// Whole 16-bit length word, reserved bits included.
    ///
    /// The reserved bits are zero in every valid frame, so anything above
    /// 1023 here means the preamble was a stray 0xD3 or the header is corrupt.
    pub fn declared_length(header: &[u8]) -> usize {
        u16::from_be_bytes([header[1], header[2]]) as usize
    }

    /// Message number from the first two payload bytes.
    pub fn parse_message_type(payload: &[u8]) -> Option<u16> {
        match payload {
            [p0, p1, ..] => Some(((*p0 as u16) << 4) | (*p1 as u16 >> 4)),
            _ => None,
        }
    }

    /// Entire frame as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Cheap clone of the underlying buffer.
    pub fn bytes(&self) -> Bytes {
        self.raw.clone()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        &self.raw[HEADER_SIZE..self.raw.len() - CRC_SIZE]
    }

    /// 12-bit message number, `None` for payloads shorter than two bytes.
    pub fn message_type(&self) -> Option<u16> {
        Self::parse_message_type(self.payload())
    }

    /// Checksum carried in the trailing three bytes.
    pub fn crc(&self) -> u32 {
        let n = self.raw.len();
        (self.raw[n - 3] as u32) << 16 | (self.raw[n - 2] as u32) << 8 | self.raw[n - 1] as u32
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}
