//! Decoder → filter → sink wiring.

use crate::decoder::FrameDecoder;
use crate::error::DecodeError;
use crate::filter::{FilterVerdict, MessageFilter};
use crate::frame::Frame;
use crate::stats::MessageStats;
use std::time::Instant;

/// Receives every verified frame that survives filtering.
pub trait FrameSink {
    fn forward(&mut self, frame: &Frame);
}

impl FrameSink for Vec<Frame> {
    fn forward(&mut self, frame: &Frame) {
        self.push(frame.clone());
    }
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn forward(&mut self, frame: &Frame) {
        (**self).forward(frame)
    }
}

/// Decoder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub bytes_in: u64,
    pub frames_forwarded: u64,
    pub frames_filtered: u64,
    pub crc_errors: u64,
    pub length_errors: u64,
    pub overflows: u64,
}

impl DecoderStats {
    fn record_error(&mut self, err: &DecodeError) {
        match err {
            DecodeError::CrcMismatch { .. } => self.crc_errors += 1,
            DecodeError::LengthInvalid { .. } => self.length_errors += 1,
            DecodeError::BufferOverflow { .. } => self.overflows += 1,
        }
    }

    pub fn errors(&self) -> u64 {
        self.crc_errors + self.length_errors + self.overflows
    }
}

/// Turns a raw byte stream into filtered frames delivered to `S`.
///
/// Decoder errors are logged and counted here and go no further.
pub struct RtcmPipeline<S> {
    decoder: FrameDecoder,
    filter: MessageFilter,
    sink: S,
    stats: DecoderStats,
    messages: MessageStats,
}

impl<S: FrameSink> RtcmPipeline<S> {
    pub fn new(sink: S) -> Self {
        Self::with_filter(sink, MessageFilter::new())
    }

    pub fn with_filter(sink: S, filter: MessageFilter) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            filter,
            sink,
            stats: DecoderStats::default(),
            messages: MessageStats::new(),
        }
    }

    pub fn process_byte(&mut self, byte: u8) {
        let Self {
            decoder,
            filter,
            sink,
            stats,
            messages,
        } = self;

        stats.bytes_in += 1;
        decoder.push(byte, |result| match result {
            Ok(frame) => match filter.check(&frame) {
                FilterVerdict::Drop => stats.frames_filtered += 1,
                FilterVerdict::Forward => {
                    stats.frames_forwarded += 1;
                    if let Some(msg_type) = frame.message_type() {
                        let interval = messages.record(msg_type, frame.len(), Instant::now());
                        tracing::debug!(
                            msg_type,
                            len = frame.len(),
                            interval_ms = interval.map(|d| d.as_millis() as u64),
                            "Forwarding RTCM message"
                        );
                    }
                    sink.forward(&frame);
                }
            },
            Err(err) => {
                stats.record_error(&err);
                tracing::error!(kind = err.kind(), "{}", err);
            }
        });
    }

    pub fn process(&mut self, data: &[u8]) {
        for &b in data {
            self.process_byte(b);
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn messages(&self) -> &MessageStats {
        &self.messages
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
