//! Byte-at-a-time RTCM3 frame decoder.
//!
//! State machine:
//! - `Idle`: discard bytes until the 0xD3 preamble
//! - `Collecting`: buffer the header, validate the length word, fold header
//!   and payload into the CRC, and compare against the trailing checksum once
//!   `length + 6` bytes are in
//!
//! Every frame boundary (success or failure) returns the decoder to `Idle`.
//! When a candidate frame is rejected, the bytes after its preamble are
//! scanned again so that a real frame hidden behind a stray 0xD3 is not lost.

use crate::crc24q::Crc24q;
use crate::error::DecodeError;
use crate::frame::Frame;
use crate::{CRC_SIZE, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, PREAMBLE};
use bytes::Bytes;
use std::collections::VecDeque;

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Hunting for a preamble.
    Idle,
    /// Inside a candidate frame.
    Collecting,
}

/// Incremental RTCM3 frame decoder.
///
/// One instance owns the state for one byte stream.
pub struct FrameDecoder {
    buf: [u8; MAX_FRAME_SIZE],
    index: usize,
    /// Declared payload length, valid once the header is complete.
    length: usize,
    crc: Crc24q,
    state: DecoderState,
    /// Bytes from a rejected candidate that still need scanning.
    replay: VecDeque<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME_SIZE],
            index: 0,
            length: 0,
            crc: Crc24q::new(),
            state: DecoderState::Idle,
            replay: VecDeque::with_capacity(MAX_FRAME_SIZE),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Number of bytes buffered for the current candidate frame.
    pub fn buffered(&self) -> usize {
        self.index
    }

    /// Feeds one byte, reporting every completed frame or rejected candidate
    /// through `emit`.
    ///
    /// Usually `emit` is called at most once, but a rejection can uncover
    /// further results among the bytes that were already buffered.
    pub fn push<F>(&mut self, byte: u8, mut emit: F)
    where
        F: FnMut(Result<Frame, DecodeError>),
    {
        if let Some(result) = self.step(byte) {
            emit(result);
        }
        while let Some(b) = self.replay.pop_front() {
            if let Some(result) = self.step(b) {
                emit(result);
            }
        }
    }

    /// Feeds a slice, collecting results in arrival order.
    pub fn decode(&mut self, data: &[u8]) -> Vec<Result<Frame, DecodeError>> {
        let mut out = Vec::new();
        for &b in data {
            self.push(b, |r| out.push(r));
        }
        out
    }

    /// Drops any partial frame and returns to `Idle`.
    pub fn reset(&mut self) {
        self.index = 0;
        self.length = 0;
        self.crc.reset();
        self.state = DecoderState::Idle;
    }

    fn step(&mut self, byte: u8) -> Option<Result<Frame, DecodeError>> {
        match self.state {
            DecoderState::Idle => {
                if byte == PREAMBLE {
                    self.crc.reset();
                    self.buf[0] = byte;
                    self.index = 1;
                    self.length = 0;
                    self.state = DecoderState::Collecting;
                }
                None
            }
            DecoderState::Collecting => self.collect(byte),
        }
    }

    fn collect(&mut self, byte: u8) -> Option<Result<Frame, DecodeError>> {
        if self.index >= MAX_FRAME_SIZE {
            let index = self.index;
            self.reject();
            return Some(Err(DecodeError::BufferOverflow { index }));
        }

        self.buf[self.index] = byte;
        if self.index >= HEADER_SIZE && self.index < self.length + HEADER_SIZE {
            self.crc.push(byte);
        }
        self.index += 1;

        if self.index == HEADER_SIZE {
            let declared = Frame::declared_length(&self.buf);
            if declared > MAX_PAYLOAD_SIZE {
                self.reject();
                return Some(Err(DecodeError::LengthInvalid {
                    declared,
                    max: MAX_PAYLOAD_SIZE,
                }));
            }
            self.length = declared;
            // Prime with the header so the CRC covers header + payload.
            self.crc.extend(&self.buf[..HEADER_SIZE]);
            return None;
        }

        if self.index > HEADER_SIZE && self.index == self.length + HEADER_SIZE + CRC_SIZE {
            let n = self.index;
            let expected = (self.buf[n - 3] as u32) << 16
                | (self.buf[n - 2] as u32) << 8
                | self.buf[n - 1] as u32;
            let actual = self.crc.value();

            if expected == actual {
                let frame = Frame::from_verified(Bytes::copy_from_slice(&self.buf[..n]));
                self.reset();
                return Some(Ok(frame));
            }

            self.reject();
            return Some(Err(DecodeError::CrcMismatch { expected, actual }));
        }

        None
    }

    /// Resets and queues everything after the bogus preamble for rescanning.
    fn reject(&mut self) {
        let mut pending: VecDeque<u8> = self.buf[1..self.index].iter().copied().collect();
        pending.extend(self.replay.drain(..));
        self.replay = pending;
        self.reset();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
