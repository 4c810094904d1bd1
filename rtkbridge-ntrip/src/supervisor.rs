//! Per-endpoint connection lifecycle.
//!
//! A [`Supervisor`] owns at most one TCP upload to a caster. It performs the
//! handshake, checks the link opportunistically, writes frames, and keeps the
//! endpoint's record on the [`StatusBoard`] current. The status record is
//! authoritative for `connected`; the socket is consulted only as a hint.

use crate::config::{EndpointConfig, EndpointId, NtripVersion};
use crate::error::NtripError;
use crate::gate::GateDecision;
use crate::handshake::{build_request, encode_chunk, ResponseScanner, ScanVerdict};
use crate::status::StatusBoard;
use crate::{
    CONNECTION_STABILITY_PERIOD, CONNECT_TIMEOUT, RESPONSE_BUFFER_SIZE, RESPONSE_TIMEOUT,
    WRITE_TIMEOUT,
};
use std::borrow::Cow;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Upper bound on reads drained by one health probe.
const MAX_PROBE_READS: usize = 8;

/// Timeouts applied by a supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    pub write_timeout: Duration,
    /// Health checks are skipped this long after connecting.
    pub stability_period: Duration,
    /// How long a health probe waits for socket readiness.
    pub probe_window: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            response_timeout: RESPONSE_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            stability_period: CONNECTION_STABILITY_PERIOD,
            probe_window: Duration::from_millis(10),
        }
    }
}

impl SupervisorConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_stability_period(mut self, period: Duration) -> Self {
        self.stability_period = period;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// What a reconnection attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Connected,
    AlreadyConnected,
    /// Disabled in settings or refused by the gate.
    Skipped,
    Failed(NtripError),
}

/// What a single frame write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardResult {
    Sent(usize),
    /// Logged, not counted, connection kept.
    Short { written: usize, expected: usize },
    NotConnected,
}

enum Probe {
    Quiet,
    Inbound(usize),
    Closed { inbound: usize },
}

struct Link {
    stream: TcpStream,
    version: NtripVersion,
}

/// Owns the connection to one caster endpoint.
pub struct Supervisor {
    id: EndpointId,
    status: Arc<StatusBoard>,
    config: SupervisorConfig,
    link: Option<Link>,
}

impl Supervisor {
    pub fn new(id: EndpointId, status: Arc<StatusBoard>, config: SupervisorConfig) -> Self {
        Self {
            id,
            status,
            config,
            link: None,
        }
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected(self.id)
    }

    /// Attempts to bring the endpoint up if it should be.
    pub async fn try_connect(&mut self, endpoint: &EndpointConfig, gate: GateDecision) -> AttemptOutcome {
        if !endpoint.enabled {
            if self.is_connected() {
                tracing::info!("NTRIP {} disabled, disconnecting", self.id);
                self.disconnect().await;
            }
            return AttemptOutcome::Skipped;
        }
        if !gate.is_admit() {
            return AttemptOutcome::Skipped;
        }
        if self.is_connected() {
            return AttemptOutcome::AlreadyConnected;
        }

        if let Some(problem) = endpoint.problem() {
            tracing::error!(endpoint = %self.id, "NTRIP {} - {}: {}", self.id, NtripError::InvalidConfig, problem);
            self.status
                .update(self.id, |s| s.record_error(NtripError::InvalidConfig));
            return AttemptOutcome::Failed(NtripError::InvalidConfig);
        }

        tracing::debug!(
            endpoint = %self.id,
            "Connecting to NTRIP {} {}:{}/{} ({})",
            self.id,
            endpoint.host,
            endpoint.port,
            endpoint.mountpoint,
            endpoint.version
        );

        match self.open(endpoint).await {
            Ok(stream) => {
                self.link = Some(Link {
                    stream,
                    version: endpoint.version,
                });
                self.status
                    .update(self.id, |s| s.mark_connected(endpoint.version, Instant::now()));
                tracing::info!(
                    endpoint = %self.id,
                    "Connected to NTRIP {} caster {}:{}/{}",
                    self.id,
                    endpoint.host,
                    endpoint.port,
                    endpoint.mountpoint
                );
                AttemptOutcome::Connected
            }
            Err(err) => {
                // The stream, if any, was dropped inside open() and is closed.
                self.status.update(self.id, |s| {
                    s.record_error(err);
                    s.mark_disconnected();
                });
                tracing::error!(
                    endpoint = %self.id,
                    attempts = self.status.reconnect_attempts(self.id),
                    "NTRIP {} - {}",
                    self.id,
                    err
                );
                AttemptOutcome::Failed(err)
            }
        }
    }

    async fn open(&self, endpoint: &EndpointConfig) -> Result<TcpStream, NtripError> {
        let addr = (endpoint.host.as_str(), endpoint.port);
        let mut stream = match timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(endpoint = %self.id, "connect error: {}", e);
                return Err(NtripError::ConnectionFailed);
            }
            Err(_) => {
                tracing::debug!(endpoint = %self.id, "connect timed out");
                return Err(NtripError::ConnectionFailed);
            }
        };
        let _ = stream.set_nodelay(true);

        let request = build_request(endpoint);
        match timeout(self.config.write_timeout, stream.write_all(&request)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(endpoint = %self.id, "handshake write error: {}", e);
                return Err(NtripError::ConnectionFailed);
            }
            Err(_) => return Err(NtripError::Timeout),
        }

        self.verify_response(&mut stream).await?;
        Ok(stream)
    }

    async fn verify_response(&self, stream: &mut TcpStream) -> Result<(), NtripError> {
        let deadline = tokio::time::Instant::now() + self.config.response_timeout;
        let mut scanner = ResponseScanner::new();
        let mut chunk = [0u8; RESPONSE_BUFFER_SIZE];

        loop {
            let room = scanner.remaining();
            let read = tokio::time::timeout_at(deadline, stream.read(&mut chunk[..room])).await;
            let verdict = match read {
                Err(_) if scanner.is_empty() => return Err(NtripError::Timeout),
                Err(_) => {
                    self.log_response(&scanner);
                    return Err(NtripError::InvalidResponse);
                }
                Ok(Err(e)) => {
                    tracing::debug!(endpoint = %self.id, "response read error: {}", e);
                    return Err(NtripError::ConnectionFailed);
                }
                Ok(Ok(0)) if scanner.is_empty() => return Err(NtripError::ConnectionFailed),
                Ok(Ok(0)) => ScanVerdict::Exhausted,
                Ok(Ok(n)) => scanner.feed(&chunk[..n]),
            };

            match verdict {
                ScanVerdict::Accepted => return Ok(()),
                ScanVerdict::Pending => continue,
                ScanVerdict::Rejected => {
                    self.log_response(&scanner);
                    return Err(NtripError::AuthFailed);
                }
                ScanVerdict::Exhausted => {
                    self.log_response(&scanner);
                    return Err(NtripError::InvalidResponse);
                }
            }
        }
    }

    fn log_response(&self, scanner: &ResponseScanner) {
        tracing::warn!(
            endpoint = %self.id,
            "NTRIP {} caster response: {}",
            self.id,
            String::from_utf8_lossy(scanner.response()).trim_end()
        );
    }

    /// Opportunistic liveness check; a no-op inside the stability period.
    pub async fn check_health(&mut self, now: Instant) -> Result<(), NtripError> {
        let status = self.status.status(self.id);
        if !status.connected {
            return Ok(());
        }
        if let Some(uptime) = status.uptime(now) {
            if uptime < self.config.stability_period {
                return Ok(());
            }
        }

        let probe = match self.link.as_mut() {
            Some(link) => probe(self.id, &mut link.stream, self.config.probe_window).await,
            None => Probe::Closed { inbound: 0 },
        };

        match probe {
            Probe::Quiet => Ok(()),
            Probe::Inbound(n) => {
                tracing::debug!(endpoint = %self.id, bytes = n, "NTRIP {} caster sent data", self.id);
                Ok(())
            }
            Probe::Closed { inbound } => {
                if inbound > 0 {
                    tracing::warn!(endpoint = %self.id, "NTRIP {} closed by server", self.id);
                }
                self.fail(NtripError::ConnectionFailed).await;
                Err(NtripError::ConnectionFailed)
            }
        }
    }

    /// Writes one frame, chunk-wrapped for v2.
    pub async fn forward(&mut self, frame: &[u8]) -> Result<ForwardResult, NtripError> {
        if !self.is_connected() {
            return Ok(ForwardResult::NotConnected);
        }
        let Some(link) = self.link.as_mut() else {
            return Ok(ForwardResult::NotConnected);
        };

        let payload: Cow<'_, [u8]> = match link.version {
            NtripVersion::V1 => Cow::Borrowed(frame),
            NtripVersion::V2 => Cow::Owned(encode_chunk(frame)),
        };

        let written = match timeout(self.config.write_timeout, link.stream.write(&payload)).await {
            Ok(Ok(n)) => n,
            Err(_) => 0,
            Ok(Err(e)) => {
                tracing::error!(endpoint = %self.id, "NTRIP {} write failed: {}", self.id, e);
                self.fail(NtripError::ConnectionFailed).await;
                return Err(NtripError::ConnectionFailed);
            }
        };

        if written == payload.len() {
            self.status.record_sent(self.id, frame.len());
            Ok(ForwardResult::Sent(frame.len()))
        } else {
            tracing::warn!(
                endpoint = %self.id,
                "NTRIP {} short write: {} of {} bytes",
                self.id,
                written,
                payload.len()
            );
            Ok(ForwardResult::Short {
                written,
                expected: payload.len(),
            })
        }
    }

    /// Records `err` and drops the connection.
    pub async fn disconnect_with(&mut self, err: NtripError) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.status.update(self.id, |s| s.record_error(err));
        tracing::info!(endpoint = %self.id, "NTRIP {} disconnected: {}", self.id, err);
        self.disconnect().await;
        true
    }

    /// Closes the socket; diagnostics survive.
    pub async fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = timeout(self.config.write_timeout, link.stream.shutdown()).await;
        }
        self.status.update(self.id, |s| s.mark_disconnected());
    }

    async fn fail(&mut self, err: NtripError) {
        self.status.update(self.id, |s| s.record_error(err));
        tracing::error!(endpoint = %self.id, "NTRIP {} - {}", self.id, err);
        self.disconnect().await;
    }
}

async fn probe(id: EndpointId, stream: &mut TcpStream, window: Duration) -> Probe {
    // Wake on buffered data or a FIN; no readiness within the window means quiet.
    if timeout(window, stream.readable()).await.is_err() {
        return Probe::Quiet;
    }

    let mut buf = [0u8; RESPONSE_BUFFER_SIZE];
    let mut inbound = 0;
    for _ in 0..MAX_PROBE_READS {
        match stream.try_read(&mut buf) {
            Ok(0) => return Probe::Closed { inbound },
            Ok(n) => {
                inbound += n;
                tracing::debug!(
                    endpoint = %id,
                    "NTRIP {} received: {}",
                    id,
                    String::from_utf8_lossy(&buf[..n]).trim_end()
                );
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(_) => return Probe::Closed { inbound },
        }
    }

    if inbound > 0 {
        Probe::Inbound(inbound)
    } else {
        Probe::Quiet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{unreachable_port, MockCaster};
    use tokio_test::assert_ok;

    fn supervisor(id: EndpointId) -> (Supervisor, Arc<StatusBoard>) {
        let board = Arc::new(StatusBoard::new());
        let config = SupervisorConfig::default()
            .with_response_timeout(Duration::from_millis(300))
            .with_stability_period(Duration::ZERO);
        (Supervisor::new(id, board.clone(), config), board)
    }

    #[tokio::test]
    async fn test_connect_v1_and_forward() {
        let caster = MockCaster::start(b"ICY 200 OK\r\n\r\n").await;
        let (mut sup, board) = supervisor(EndpointId::Primary);
        let endpoint = caster.endpoint().with_credentials("", "secret");

        let outcome = sup.try_connect(&endpoint, GateDecision::Admit).await;
        assert_eq!(outcome, AttemptOutcome::Connected);
        assert!(board.is_connected(EndpointId::Primary));

        let request = caster.request().await;
        assert!(request.starts_with("SOURCE secret /TEST\r\nSource-Agent: NTRIP "));

        let frame = [0xD3, 0x00, 0x00, 0x47, 0xEA, 0x4B];
        assert_eq!(sup.forward(&frame).await.unwrap(), ForwardResult::Sent(6));
        assert_eq!(caster.received(6).await, frame.to_vec());
        assert_eq!(board.status(EndpointId::Primary).bytes_sent, 6);

        let again = sup.try_connect(&endpoint, GateDecision::Admit).await;
        assert_eq!(again, AttemptOutcome::AlreadyConnected);
    }

    #[tokio::test]
    async fn test_v2_forward_uses_chunks() {
        let caster = MockCaster::start(b"HTTP/1.1 200 OK\r\n\r\n").await;
        let (mut sup, board) = supervisor(EndpointId::Secondary);
        let endpoint = caster
            .endpoint()
            .with_version(NtripVersion::V2)
            .with_credentials("user", "pass123");

        assert_eq!(
            sup.try_connect(&endpoint, GateDecision::Admit).await,
            AttemptOutcome::Connected
        );
        let request = caster.request().await;
        assert!(request.starts_with("POST /TEST HTTP/1.1\r\n"));
        assert!(request.contains("Authorization: Basic dXNlcjpwYXNzMTIz\r\n"));

        let frame = [0xD3u8; 12];
        assert_eq!(sup.forward(&frame).await.unwrap(), ForwardResult::Sent(12));
        let mut expected = b"C\r\n".to_vec();
        expected.extend_from_slice(&frame);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(caster.received(expected.len()).await, expected);
        assert_eq!(board.status(EndpointId::Secondary).bytes_sent, 12);
    }

    #[tokio::test]
    async fn test_auth_rejection() {
        let caster = MockCaster::start(b"HTTP/1.1 401 Unauthorized\r\n\r\n").await;
        let (mut sup, board) = supervisor(EndpointId::Primary);

        let outcome = sup.try_connect(&caster.endpoint(), GateDecision::Admit).await;
        assert_eq!(outcome, AttemptOutcome::Failed(NtripError::AuthFailed));
        let status = board.status(EndpointId::Primary);
        assert!(!status.connected);
        assert_eq!(status.reconnect_attempts, 1);
        assert_eq!(status.last_error, "Authentication failed");
    }

    #[tokio::test]
    async fn test_silent_caster_times_out() {
        let caster = MockCaster::silent().await;
        let (mut sup, board) = supervisor(EndpointId::Primary);

        let outcome = sup.try_connect(&caster.endpoint(), GateDecision::Admit).await;
        assert_eq!(outcome, AttemptOutcome::Failed(NtripError::Timeout));
        assert_eq!(board.reconnect_attempts(EndpointId::Primary), 1);
    }

    #[tokio::test]
    async fn test_garbage_response_is_invalid() {
        let caster = MockCaster::start(b"ERROR - Bad Mountpoint\r\n").await;
        let (mut sup, _board) = supervisor(EndpointId::Primary);

        let outcome = sup.try_connect(&caster.endpoint(), GateDecision::Admit).await;
        assert_eq!(outcome, AttemptOutcome::Failed(NtripError::InvalidResponse));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let port = unreachable_port().await;
        let (mut sup, board) = supervisor(EndpointId::Secondary);
        let endpoint = EndpointConfig::new("127.0.0.1", port, "TEST");

        let outcome = sup.try_connect(&endpoint, GateDecision::Admit).await;
        assert_eq!(outcome, AttemptOutcome::Failed(NtripError::ConnectionFailed));
        let status = board.status(EndpointId::Secondary);
        assert_eq!(status.reconnect_attempts, 1);
        assert_eq!(status.last_error, "Failed to connect to host");
    }

    #[tokio::test]
    async fn test_invalid_config_not_counted() {
        let (mut sup, board) = supervisor(EndpointId::Primary);
        let endpoint = EndpointConfig::new("", 2101, "TEST");

        let outcome = sup.try_connect(&endpoint, GateDecision::Admit).await;
        assert_eq!(outcome, AttemptOutcome::Failed(NtripError::InvalidConfig));
        let status = board.status(EndpointId::Primary);
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(status.last_error, "Invalid configuration");
    }

    #[tokio::test]
    async fn test_skips_when_disabled_or_gated() {
        let (mut sup, board) = supervisor(EndpointId::Primary);
        let endpoint = EndpointConfig::new("127.0.0.1", 1, "TEST");

        let disabled = endpoint.clone().with_enabled(false);
        assert_eq!(
            sup.try_connect(&disabled, GateDecision::Admit).await,
            AttemptOutcome::Skipped
        );
        let gated = GateDecision::Reject(crate::RejectReason::RtcmTimeout);
        assert_eq!(sup.try_connect(&endpoint, gated).await, AttemptOutcome::Skipped);
        assert_eq!(board.reconnect_attempts(EndpointId::Primary), 0);
    }

    #[tokio::test]
    async fn test_disabling_disconnects() {
        let caster = MockCaster::start(b"ICY 200 OK\r\n").await;
        let (mut sup, board) = supervisor(EndpointId::Primary);
        let endpoint = caster.endpoint();
        sup.try_connect(&endpoint, GateDecision::Admit).await;
        assert!(board.is_connected(EndpointId::Primary));

        let outcome = sup
            .try_connect(&endpoint.with_enabled(false), GateDecision::Admit)
            .await;
        assert_eq!(outcome, AttemptOutcome::Skipped);
        assert!(!board.is_connected(EndpointId::Primary));
    }

    #[tokio::test]
    async fn test_health_detects_server_close() {
        let caster = MockCaster::start(b"ICY 200 OK\r\n").await;
        let (mut sup, board) = supervisor(EndpointId::Primary);
        sup.try_connect(&caster.endpoint(), GateDecision::Admit).await;
        caster.request().await;

        assert_ok!(sup.check_health(Instant::now()).await);
        assert!(board.is_connected(EndpointId::Primary));

        caster.hang_up().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            sup.check_health(Instant::now()).await,
            Err(NtripError::ConnectionFailed)
        );
        let status = board.status(EndpointId::Primary);
        assert!(!status.connected);
        assert_eq!(status.reconnect_attempts, 1);
    }

    #[tokio::test]
    async fn test_health_respects_stability_period() {
        let caster = MockCaster::start(b"ICY 200 OK\r\n").await;
        let board = Arc::new(StatusBoard::new());
        let mut sup = Supervisor::new(
            EndpointId::Primary,
            board.clone(),
            SupervisorConfig::default().with_stability_period(Duration::from_secs(60)),
        );
        sup.try_connect(&caster.endpoint(), GateDecision::Admit).await;
        caster.hang_up().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Inside the grace period the closed socket goes unnoticed
        assert_ok!(sup.check_health(Instant::now()).await);
        assert!(board.is_connected(EndpointId::Primary));
    }

    #[tokio::test]
    async fn test_disconnect_preserves_attempts() {
        let caster = MockCaster::start(b"ICY 200 OK\r\n").await;
        let (mut sup, board) = supervisor(EndpointId::Primary);
        sup.try_connect(&caster.endpoint(), GateDecision::Admit).await;
        board.update(EndpointId::Primary, |s| s.reconnect_attempts = 2);

        assert!(sup.disconnect_with(NtripError::SurveyInActive).await);
        let status = board.status(EndpointId::Primary);
        assert!(!status.connected);
        assert_eq!(status.reconnect_attempts, 2);
        assert_eq!(status.last_error, "Survey-in active");

        // Already down: nothing to do
        assert!(!sup.disconnect_with(NtripError::SurveyInActive).await);
    }

    #[tokio::test]
    async fn test_short_write_keeps_connection() {
        let caster = MockCaster::stalled().await;
        let board = Arc::new(StatusBoard::new());
        let config = SupervisorConfig::default()
            .with_response_timeout(Duration::from_millis(300))
            .with_write_timeout(Duration::from_millis(20));
        let mut sup = Supervisor::new(EndpointId::Primary, board.clone(), config);
        assert_eq!(
            sup.try_connect(&caster.endpoint(), GateDecision::Admit).await,
            AttemptOutcome::Connected
        );

        let frame = vec![0xA5u8; rtkbridge_rtcm::MAX_FRAME_SIZE];
        let mut sent = 0u64;
        let mut short = None;
        // The peer never reads, so the send and receive buffers eventually fill.
        for _ in 0..200_000 {
            match assert_ok!(sup.forward(&frame).await) {
                ForwardResult::Sent(n) => sent += n as u64,
                result @ ForwardResult::Short { .. } => {
                    short = Some(result);
                    break;
                }
                ForwardResult::NotConnected => panic!("link dropped on a full buffer"),
            }
        }

        match short {
            Some(ForwardResult::Short { written, expected }) => {
                assert!(written < expected);
                assert_eq!(expected, frame.len());
            }
            other => panic!("expected a short write, got {:?}", other),
        }
        let status = board.status(EndpointId::Primary);
        assert!(status.connected);
        assert_eq!(status.bytes_sent, sent);
        assert_eq!(status.reconnect_attempts, 0);
        assert!(status.last_error.is_empty());
        assert!(sup.is_connected());
    }

    #[tokio::test]
    async fn test_forward_when_disconnected() {
        let (mut sup, board) = supervisor(EndpointId::Primary);
        let result = assert_ok!(sup.forward(&[0xD3, 0, 0]).await);
        assert_eq!(result, ForwardResult::NotConnected);
        assert_eq!(board.totals().frames_forwarded, 0);
    }
}
