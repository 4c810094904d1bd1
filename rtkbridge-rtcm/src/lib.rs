//! # rtkbridge-rtcm
//!
//! RTCM3 framing for rtkbridge.
//!
//! This crate provides:
//! - Table-driven CRC24Q
//! - A byte-at-a-time frame decoder that resynchronises on garbage
//! - Content-aware message filtering
//! - The `FrameSink` seam between decoding and forwarding

pub mod crc24q;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod frame;
pub mod pipeline;
pub mod stats;

pub use crc24q::Crc24q;
pub use decoder::{DecoderState, FrameDecoder};
pub use error::DecodeError;
pub use filter::{FilterVerdict, MessageFilter};
pub use frame::Frame;
pub use pipeline::{DecoderStats, FrameSink, RtcmPipeline};
pub use stats::MessageStats;

/// RTCM3 preamble byte.
pub const PREAMBLE: u8 = 0xD3;

/// Preamble plus the two length bytes.
pub const HEADER_SIZE: usize = 3;

/// Trailing CRC24Q bytes.
pub const CRC_SIZE: usize = 3;

/// Largest payload the 10-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = 1023;

/// Largest complete frame (3 header + 1023 payload + 3 CRC).
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE + CRC_SIZE;

/// GLONASS L1/L2 code-phase biases.
pub const MSG_GLONASS_BIASES: u16 = 1230;
