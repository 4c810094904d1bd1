//! # rtkbridge-ntrip
//!
//! NTRIP source (uploading) client for rtkbridge.
//!
//! This crate provides:
//! - NTRIP 1.0 `SOURCE` and 2.0 `POST` handshakes with incremental response checks
//! - One supervisor per caster endpoint (primary, secondary)
//! - A forwarding gate driven by RTCM freshness and GNSS survey-in state
//! - Shared reconnection backoff and a single periodic task loop
//! - A lock-guarded status board for status readers

pub mod auth;
pub mod backoff;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod gate;
pub mod handshake;
pub mod status;
pub mod supervisor;
pub mod task;

#[cfg(test)]
mod testutil;

pub use backoff::ReconnectBackoff;
pub use config::{EndpointConfig, EndpointId, GnssStatus, NtripVersion, SettingsStore, StaticSettings};
pub use error::{NtripError, RejectReason};
pub use forwarder::CorrectionForwarder;
pub use gate::{CorrectionClock, ForwardingGate, GateDecision};
pub use status::{BoardTotals, EndpointSnapshot, EndpointStatus, StatusBoard};
pub use supervisor::{AttemptOutcome, ForwardResult, Supervisor, SupervisorConfig};
pub use task::{IterationReport, NtripTask, TaskConfig};

use std::time::Duration;

/// Version string sent in `Source-Agent` / `User-Agent`.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Time allowed for the caster to answer the handshake.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on a single frame write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest gap in correction data before uploads are stopped.
pub const MAX_TIME_BEFORE_HANGUP: Duration = Duration::from_secs(10);

/// Reconnect sweep interval.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Reconnect sweep interval once attempts pile up.
pub const SLOW_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Attempts before switching to [`SLOW_RECONNECT_DELAY`].
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Minimum spacing between health checks.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Grace period after connecting before health checks apply.
pub const CONNECTION_STABILITY_PERIOD: Duration = Duration::from_secs(5);

/// Maximum handshake response inspected.
pub const RESPONSE_BUFFER_SIZE: usize = 512;

/// Spacing of the periodic status log line.
pub const STATUS_REPORT_INTERVAL: Duration = Duration::from_secs(10);
