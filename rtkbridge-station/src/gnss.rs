//! GNSS receiver state.

use rtkbridge_ntrip::GnssStatus;
use std::sync::atomic::{AtomicBool, Ordering};

/// Survey-in flag set by whatever monitors the receiver.
#[derive(Debug, Default)]
pub struct SurveyFlag {
    active: AtomicBool,
}

impl SurveyFlag {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    /// Returns the previous state.
    pub fn set(&self, active: bool) -> bool {
        let previous = self.active.swap(active, Ordering::AcqRel);
        if previous != active {
            if active {
                tracing::info!("Survey-in started");
            } else {
                tracing::info!("Survey-in complete");
            }
        }
        previous
    }
}

impl GnssStatus for SurveyFlag {
    fn survey_in_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
