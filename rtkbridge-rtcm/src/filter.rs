//! Content-aware suppression of frames that carry no correction data.

use crate::frame::Frame;
use crate::MSG_GLONASS_BIASES;

/// Frames at or below this size carry a 1230 header but no bias values.
pub const EMPTY_BIASES_MAX_LEN: usize = 10;

/// Outcome of running a frame through the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Forward and count as fresh correction data.
    Forward,
    /// Drop silently.
    Drop,
}

/// Drops placeholder messages that some receivers emit periodically.
///
/// An empty 1230 would otherwise keep the staleness timer alive without
/// delivering anything a rover can use.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    _priv: (),
}

impl MessageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, frame: &Frame) -> FilterVerdict {
        match frame.message_type() {
            Some(MSG_GLONASS_BIASES) if frame.len() <= EMPTY_BIASES_MAX_LEN => {
                tracing::debug!(
                    "Filtering empty RTCM 1230 (no bias data), length {}",
                    frame.len()
                );
                FilterVerdict::Drop
            }
            _ => FilterVerdict::Forward,
        }
    }
}
