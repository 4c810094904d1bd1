//! Shared admission policy for caster uploads.

use crate::config::{GnssStatus, SettingsStore};
use crate::error::RejectReason;
use crate::MAX_TIME_BEFORE_HANGUP;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Arrival time of the most recent forwarded correction frame.
///
/// Written from the byte-receive path, read by the task loop.
#[derive(Debug, Default)]
pub struct CorrectionClock {
    last: Mutex<Option<Instant>>,
}

impl CorrectionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, now: Instant) {
        *self.last.lock() = Some(now);
    }

    pub fn last(&self) -> Option<Instant> {
        *self.last.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Admit,
    Reject(RejectReason),
}

impl GateDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, GateDecision::Admit)
    }
}

/// Pure gate rule.
///
/// With the freshness check off everything is admitted. Otherwise survey-in
/// blocks first, then data must have been seen within `max_silence`; no data
/// at all is stale.
pub fn decide(
    rtcm_check: bool,
    survey_in_active: bool,
    last_correction: Option<Instant>,
    now: Instant,
    max_silence: Duration,
) -> GateDecision {
    if !rtcm_check {
        return GateDecision::Admit;
    }
    if survey_in_active {
        return GateDecision::Reject(RejectReason::SurveyInActive);
    }
    let fresh = last_correction
        .map(|last| now.saturating_duration_since(last) <= max_silence)
        .unwrap_or(false);
    if !fresh {
        return GateDecision::Reject(RejectReason::RtcmTimeout);
    }
    GateDecision::Admit
}

/// Evaluates [`decide`] against live collaborators.
pub struct ForwardingGate {
    clock: Arc<CorrectionClock>,
    gnss: Arc<dyn GnssStatus>,
    settings: Arc<dyn SettingsStore>,
    max_silence: Duration,
}

impl ForwardingGate {
    pub fn new(
        clock: Arc<CorrectionClock>,
        gnss: Arc<dyn GnssStatus>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            clock,
            gnss,
            settings,
            max_silence: MAX_TIME_BEFORE_HANGUP,
        }
    }

    pub fn with_max_silence(mut self, max_silence: Duration) -> Self {
        self.max_silence = max_silence;
        self
    }

    pub fn evaluate(&self, now: Instant) -> GateDecision {
        decide(
            self.settings.rtcm_check_enabled(),
            self.gnss.survey_in_active(),
            self.clock.last(),
            now,
            self.max_silence,
        )
    }

    pub fn clock(&self) -> &Arc<CorrectionClock> {
        &self.clock
    }
}
