//! The single periodic driver for both caster endpoints.
//!
//! Each iteration evaluates the forwarding gate, then either tears down live
//! uploads (reject) or runs rate-limited health checks and, when the backoff
//! allows, a reconnection sweep over both endpoints (admit). Frames queued by
//! [`CorrectionForwarder`](crate::CorrectionForwarder) are written between
//! iterations.

use crate::backoff::ReconnectBackoff;
use crate::config::{EndpointId, SettingsStore};
use crate::error::NtripError;
use crate::gate::{ForwardingGate, GateDecision};
use crate::status::StatusBoard;
use crate::supervisor::{AttemptOutcome, ForwardResult, Supervisor, SupervisorConfig};
use crate::{HEALTH_CHECK_INTERVAL, STATUS_REPORT_INTERVAL};
use rtkbridge_rtcm::Frame;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Task loop timing.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub poll_interval: Duration,
    pub health_check_interval: Duration,
    pub report_interval: Duration,
    pub supervisor: SupervisorConfig,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            health_check_interval: HEALTH_CHECK_INTERVAL,
            report_interval: STATUS_REPORT_INTERVAL,
            supervisor: SupervisorConfig::default(),
        }
    }
}

/// What one loop iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub decision: GateDecision,
    /// Endpoints torn down by a gate rejection.
    pub disconnected: Vec<EndpointId>,
    /// Endpoints dropped by the health check.
    pub unhealthy: Vec<EndpointId>,
    /// Primary and secondary outcomes, when a sweep ran.
    pub sweep: Option<[AttemptOutcome; 2]>,
}

impl IterationReport {
    fn new(decision: GateDecision) -> Self {
        Self {
            decision,
            disconnected: Vec::new(),
            unhealthy: Vec::new(),
            sweep: None,
        }
    }
}

/// Owns both supervisors and drives them.
pub struct NtripTask {
    primary: Supervisor,
    secondary: Supervisor,
    gate: ForwardingGate,
    settings: Arc<dyn SettingsStore>,
    status: Arc<StatusBoard>,
    backoff: ReconnectBackoff,
    config: TaskConfig,
    last_decision: Option<GateDecision>,
    last_health_check: Option<Instant>,
    last_report: Option<Instant>,
}

impl NtripTask {
    pub fn new(
        gate: ForwardingGate,
        settings: Arc<dyn SettingsStore>,
        status: Arc<StatusBoard>,
        config: TaskConfig,
    ) -> Self {
        Self {
            primary: Supervisor::new(EndpointId::Primary, status.clone(), config.supervisor.clone()),
            secondary: Supervisor::new(EndpointId::Secondary, status.clone(), config.supervisor.clone()),
            gate,
            settings,
            status,
            backoff: ReconnectBackoff::new(),
            config,
            last_decision: None,
            last_health_check: None,
            last_report: None,
        }
    }

    pub fn with_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    /// Current spacing between reconnection sweeps.
    pub fn reconnect_interval(&self) -> Duration {
        self.backoff.interval()
    }

    /// Runs until `shutdown` flips to true or its sender goes away.
    pub async fn run(mut self, mut frames: mpsc::Receiver<Frame>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("NTRIP task started");

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frames_open = true;

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.iterate(Instant::now()).await;
                }
                frame = frames.recv(), if frames_open => match frame {
                    Some(frame) => self.forward(&frame).await,
                    None => {
                        frames_open = false;
                        tracing::warn!("RTCM frame source closed");
                    }
                },
            }
        }

        self.shutdown().await;
        tracing::info!("NTRIP task stopped");
    }

    /// One pass of gate, health, and reconnection logic.
    pub async fn iterate(&mut self, now: Instant) -> IterationReport {
        let decision = self.gate.evaluate(now);
        self.note_decision(decision);
        let mut report = IterationReport::new(decision);

        match decision {
            GateDecision::Reject(reason) => {
                let err = NtripError::from(reason);
                let (primary, secondary) = tokio::join!(
                    self.primary.disconnect_with(err),
                    self.secondary.disconnect_with(err)
                );
                if primary {
                    report.disconnected.push(EndpointId::Primary);
                }
                if secondary {
                    report.disconnected.push(EndpointId::Secondary);
                }
            }
            GateDecision::Admit => {
                if self.health_check_due(now) {
                    self.last_health_check = Some(now);
                    let (primary, secondary) = tokio::join!(
                        self.primary.check_health(now),
                        self.secondary.check_health(now)
                    );
                    if primary.is_err() {
                        report.unhealthy.push(EndpointId::Primary);
                    }
                    if secondary.is_err() {
                        report.unhealthy.push(EndpointId::Secondary);
                    }
                }

                self.backoff.observe(self.status.max_reconnect_attempts());
                if self.backoff.is_due(now) {
                    report.sweep = Some(self.sweep(now, decision).await);
                }
            }
        }

        self.maybe_report(now);
        report
    }

    async fn sweep(&mut self, now: Instant, decision: GateDecision) -> [AttemptOutcome; 2] {
        self.backoff.begin_sweep(now);

        let primary_config = self.settings.endpoint(EndpointId::Primary);
        let secondary_config = self.settings.endpoint(EndpointId::Secondary);
        let (primary, secondary) = tokio::join!(
            self.primary.try_connect(&primary_config, decision),
            self.secondary.try_connect(&secondary_config, decision)
        );

        let any_connected =
            primary == AttemptOutcome::Connected || secondary == AttemptOutcome::Connected;
        self.backoff
            .finish_sweep(any_connected, self.status.max_reconnect_attempts());

        [primary, secondary]
    }

    /// Writes one frame to every connected endpoint.
    pub async fn forward(&mut self, frame: &Frame) {
        let bytes = frame.as_bytes();
        // Failures are recorded by the supervisors themselves.
        let (primary, secondary) =
            tokio::join!(self.primary.forward(bytes), self.secondary.forward(bytes));
        let delivered = [primary, secondary]
            .iter()
            .any(|result| matches!(result, Ok(ForwardResult::Sent(_))));
        if delivered {
            self.status.record_forwarded();
        }
    }

    async fn shutdown(&mut self) {
        for supervisor in [&mut self.primary, &mut self.secondary] {
            if supervisor.is_connected() {
                supervisor.disconnect().await;
            }
        }
    }

    fn health_check_due(&self, now: Instant) -> bool {
        self.last_health_check
            .map(|last| now.saturating_duration_since(last) >= self.config.health_check_interval)
            .unwrap_or(true)
    }

    fn note_decision(&mut self, decision: GateDecision) {
        if self.last_decision == Some(decision) {
            return;
        }
        match decision {
            GateDecision::Reject(reason) => {
                tracing::warn!("NTRIP forwarding stopped: {}", NtripError::from(reason));
            }
            GateDecision::Admit => {
                if self.last_decision.is_some() {
                    tracing::info!("NTRIP forwarding resumed");
                }
            }
        }
        self.last_decision = Some(decision);
    }

    fn maybe_report(&mut self, now: Instant) {
        let due = self
            .last_report
            .map(|last| now.saturating_duration_since(last) >= self.config.report_interval)
            .unwrap_or(true);
        if due {
            self.last_report = Some(now);
            let totals = self.status.totals();
            tracing::info!(
                total_bytes = totals.total_bytes_forwarded,
                frames = totals.frames_forwarded,
                dropped = totals.frames_dropped,
                "NTRIP Status - {}",
                self.status.summary()
            );
        }
    }
}
