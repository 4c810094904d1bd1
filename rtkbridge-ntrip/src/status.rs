//! Per-endpoint connection status shared with status readers.

use crate::config::{EndpointId, NtripVersion};
use crate::error::NtripError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Live state of one caster connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointStatus {
    pub connected: bool,
    /// Frame bytes delivered on the current connection.
    pub bytes_sent: u64,
    /// Empty when the last attempt succeeded.
    pub last_error: String,
    pub reconnect_attempts: u32,
    pub connection_opened_at: Option<Instant>,
    pub connected_since: Option<DateTime<Utc>>,
    pub protocol_version: NtripVersion,
}

impl EndpointStatus {
    pub fn mark_connected(&mut self, version: NtripVersion, now: Instant) {
        self.connected = true;
        self.bytes_sent = 0;
        self.reconnect_attempts = 0;
        self.last_error.clear();
        self.connection_opened_at = Some(now);
        self.connected_since = Some(Utc::now());
        self.protocol_version = version;
    }

    /// Keeps `reconnect_attempts` and `last_error`.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
        self.bytes_sent = 0;
        self.connection_opened_at = None;
        self.connected_since = None;
    }

    /// Records a failure; only connection-class errors count as attempts.
    pub fn record_error(&mut self, err: NtripError) {
        self.last_error = err.to_string();
        if err.is_connection_class() {
            self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        }
    }

    pub fn uptime(&self, now: Instant) -> Option<Duration> {
        self.connection_opened_at
            .map(|opened| now.saturating_duration_since(opened))
    }
}

/// Point-in-time copy of an endpoint, safe to hand to other threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointSnapshot {
    pub endpoint: EndpointId,
    pub connected: bool,
    pub bytes_sent: u64,
    pub reconnect_attempts: u32,
    pub last_error: String,
    pub connected_since: Option<DateTime<Utc>>,
    pub uptime_secs: Option<u64>,
    pub protocol_version: NtripVersion,
}

/// Aggregate counters across both endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoardTotals {
    /// Bytes written, summed over both endpoints.
    pub total_bytes_forwarded: u64,
    /// Frames delivered to at least one endpoint, each counted once.
    pub frames_forwarded: u64,
    /// Frames dropped before reaching the task loop.
    pub frames_dropped: u64,
}

#[derive(Debug, Default)]
struct BoardInner {
    endpoints: [EndpointStatus; 2],
    totals: BoardTotals,
}

/// Mutex-guarded status records for both endpoints.
///
/// Every accessor takes the lock for one short read-modify-write and never
/// across I/O.
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: Mutex<BoardInner>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against one endpoint record under the lock.
    pub fn update<R>(&self, id: EndpointId, f: impl FnOnce(&mut EndpointStatus) -> R) -> R {
        let mut inner = self.inner.lock();
        f(&mut inner.endpoints[id.index()])
    }

    pub fn status(&self, id: EndpointId) -> EndpointStatus {
        self.inner.lock().endpoints[id.index()].clone()
    }

    pub fn is_connected(&self, id: EndpointId) -> bool {
        self.inner.lock().endpoints[id.index()].connected
    }

    pub fn reconnect_attempts(&self, id: EndpointId) -> u32 {
        self.inner.lock().endpoints[id.index()].reconnect_attempts
    }

    /// Highest attempt count of the two endpoints.
    pub fn max_reconnect_attempts(&self) -> u32 {
        let inner = self.inner.lock();
        inner
            .endpoints
            .iter()
            .map(|s| s.reconnect_attempts)
            .max()
            .unwrap_or(0)
    }

    /// Counts bytes written to one endpoint.
    pub fn record_sent(&self, id: EndpointId, bytes: usize) {
        let mut inner = self.inner.lock();
        inner.endpoints[id.index()].bytes_sent += bytes as u64;
        inner.totals.total_bytes_forwarded += bytes as u64;
    }

    pub fn record_forwarded(&self) {
        self.inner.lock().totals.frames_forwarded += 1;
    }

    pub fn record_dropped(&self) {
        self.inner.lock().totals.frames_dropped += 1;
    }

    pub fn totals(&self) -> BoardTotals {
        self.inner.lock().totals
    }

    pub fn snapshot(&self, id: EndpointId) -> EndpointSnapshot {
        let now = Instant::now();
        let status = self.status(id);
        EndpointSnapshot {
            endpoint: id,
            connected: status.connected,
            bytes_sent: status.bytes_sent,
            reconnect_attempts: status.reconnect_attempts,
            last_error: status.last_error.clone(),
            connected_since: status.connected_since,
            uptime_secs: status.uptime(now).map(|d| d.as_secs()),
            protocol_version: status.protocol_version,
        }
    }

    pub fn snapshots(&self) -> [EndpointSnapshot; 2] {
        EndpointId::ALL.map(|id| self.snapshot(id))
    }

    /// One-line summary used by the periodic status log.
    pub fn summary(&self) -> String {
        let [primary, secondary] = self.snapshots();
        let describe = |s: &EndpointSnapshot| {
            if s.connected {
                format!("Connected ({} bytes)", s.bytes_sent)
            } else if s.last_error.is_empty() {
                "Disconnected".to_string()
            } else {
                format!("Disconnected ({})", s.last_error)
            }
        };
        format!(
            "Primary: {}, Secondary: {}",
            describe(&primary),
            describe(&secondary)
        )
    }
}
