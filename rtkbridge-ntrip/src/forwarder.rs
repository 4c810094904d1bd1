//! Hand-off from the byte-receive path to the NTRIP task.

use crate::gate::CorrectionClock;
use crate::status::StatusBoard;
use rtkbridge_rtcm::{Frame, FrameSink};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Default depth of the frame queue.
pub const FRAME_QUEUE_CAPACITY: usize = 256;

/// Creates the bounded queue between the receive path and the task loop.
pub fn frame_channel(capacity: usize) -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    mpsc::channel(capacity)
}

/// [`FrameSink`] that stamps the correction clock and queues frames for upload.
///
/// Never blocks: a full queue drops the frame.
pub struct CorrectionForwarder {
    clock: Arc<CorrectionClock>,
    frames: mpsc::Sender<Frame>,
    status: Arc<StatusBoard>,
}

impl CorrectionForwarder {
    pub fn new(clock: Arc<CorrectionClock>, frames: mpsc::Sender<Frame>, status: Arc<StatusBoard>) -> Self {
        Self {
            clock,
            frames,
            status,
        }
    }
}

impl FrameSink for CorrectionForwarder {
    fn forward(&mut self, frame: &Frame) {
        self.clock.record(Instant::now());

        match self.frames.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.status.record_dropped();
                tracing::warn!(len = frame.len(), "Frame queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                self.status.record_dropped();
                tracing::debug!("NTRIP task gone, dropping frame");
            }
        }
    }
}
