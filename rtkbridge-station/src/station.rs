//! Top-level wiring: byte source → RTCM pipeline → NTRIP task.

use crate::config::Config;
use crate::error::{ConfigError, StationError};
use crate::gnss::SurveyFlag;
use crate::report::run_reporter;
use crate::settings::LiveSettings;
use crate::source::{self, ByteSource};
use rtkbridge_ntrip::forwarder::frame_channel;
use rtkbridge_ntrip::{CorrectionClock, CorrectionForwarder, ForwardingGate, NtripTask, StatusBoard};
use rtkbridge_rtcm::RtcmPipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// A running base station.
pub struct Station {
    settings: Arc<LiveSettings>,
    survey: Arc<SurveyFlag>,
    status: Arc<StatusBoard>,
    clock: Arc<CorrectionClock>,
    shutdown_tx: watch::Sender<bool>,
}

impl Station {
    /// Validates `config`; `config_path` is kept for reloads.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Result<Self, StationError> {
        config.validate()?;
        let survey = Arc::new(SurveyFlag::new(config.station.survey_in));
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            settings: Arc::new(LiveSettings::new(config, config_path)),
            survey,
            status: Arc::new(StatusBoard::new()),
            clock: Arc::new(CorrectionClock::new()),
            shutdown_tx,
        })
    }

    pub fn settings(&self) -> &Arc<LiveSettings> {
        &self.settings
    }

    pub fn survey(&self) -> &Arc<SurveyFlag> {
        &self.survey
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    /// Reloads the configuration file and applies the survey-in setting.
    ///
    /// Returns `false` when the station was started without a file.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        if !self.settings.reload()? {
            return Ok(false);
        }
        self.survey.set(self.settings.config().station.survey_in);
        Ok(true)
    }

    /// Signals every task to stop.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Opens the configured source and runs until it ends or shutdown.
    pub async fn run(&self) -> Result<(), StationError> {
        let reader = source::open(&self.settings.config().source).await?;
        self.run_with_source(reader).await
    }

    /// Runs with an already open byte source.
    pub async fn run_with_source(&self, reader: ByteSource) -> Result<(), StationError> {
        // Receivers subscribed from here on would never see an earlier stop.
        if *self.shutdown_tx.borrow() {
            return Ok(());
        }
        let config = self.settings.config();
        let (frames_tx, frames_rx) = frame_channel(config.task.channel_capacity);

        let gate = ForwardingGate::new(
            self.clock.clone(),
            self.survey.clone(),
            self.settings.clone(),
        );
        let task = NtripTask::new(
            gate,
            self.settings.clone(),
            self.status.clone(),
            config.task.task_config(),
        );
        let ntrip_handle = tokio::spawn(task.run(frames_rx, self.shutdown_tx.subscribe()));

        let report_handle = config.station.status_file.clone().map(|path| {
            tracing::info!(path = %path.display(), "Writing status reports");
            tokio::spawn(run_reporter(
                self.status.clone(),
                path,
                config.task.report_interval(),
                self.shutdown_tx.subscribe(),
            ))
        });

        let mut pipeline = RtcmPipeline::new(CorrectionForwarder::new(
            self.clock.clone(),
            frames_tx,
            self.status.clone(),
        ));
        let result = source::pump(
            reader,
            &mut pipeline,
            config.source.read_buffer_size,
            self.shutdown_tx.subscribe(),
        )
        .await;

        if let Err(e) = &result {
            tracing::error!("Correction source failed: {}", e);
        }
        self.shutdown();

        let _ = ntrip_handle.await;
        if let Some(handle) = report_handle {
            let _ = handle.await;
        }

        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtkbridge_ntrip::EndpointId;
    use rtkbridge_rtcm::Frame;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.caster1.enabled = true;
        assert!(matches!(
            Station::new(config, None),
            Err(StationError::Config(_))
        ));
    }

    #[test]
    fn test_reload_updates_survey_flag() {
        use rtkbridge_ntrip::{GateDecision, GnssStatus, RejectReason};
        use std::time::Instant;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtkbridge.yaml");
        std::fs::write(&path, "station:\n  survey_in: false\n").unwrap();
        let station = Station::new(Config::from_file(&path).unwrap(), Some(path.clone())).unwrap();

        let clock = Arc::new(CorrectionClock::new());
        let gate = ForwardingGate::new(
            clock.clone(),
            station.survey().clone(),
            station.settings().clone(),
        );
        let now = Instant::now();
        clock.record(now);
        assert_eq!(gate.evaluate(now), GateDecision::Admit);

        std::fs::write(&path, "station:\n  survey_in: true\n").unwrap();
        assert!(station.reload().unwrap());
        assert!(station.survey().survey_in_active());
        assert_eq!(
            gate.evaluate(now),
            GateDecision::Reject(RejectReason::SurveyInActive)
        );

        std::fs::write(&path, "station:\n  survey_in: false\n").unwrap();
        assert!(station.reload().unwrap());
        assert_eq!(gate.evaluate(now), GateDecision::Admit);
    }

    #[test]
    fn test_reload_without_file() {
        let station = Station::new(Config::default(), None).unwrap();
        assert!(!station.reload().unwrap());
    }

    #[tokio::test]
    async fn test_station_forwards_to_caster() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut config = Config::default();
        config.caster1.enabled = true;
        config.caster1.host = "127.0.0.1".into();
        config.caster1.port = port;
        config.caster1.mountpoint = "TEST".into();
        config.caster1.password = "secret".into();

        let station = Arc::new(Station::new(config, None).unwrap());
        let (mut writer, reader) = tokio::io::duplex(4096);
        let runner = {
            let station = station.clone();
            tokio::spawn(async move { station.run_with_source(Box::new(reader)).await })
        };

        let frame = Frame::encode(&[0x3E, 0xD0, 0x00, 0x01, 0x02]).unwrap();
        let feeder = {
            let bytes = frame.as_bytes().to_vec();
            tokio::spawn(async move {
                loop {
                    if writer.write_all(&bytes).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
        };

        let (mut socket, _) = tokio::time::timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap()
            .unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 256];
        while !request.ends_with(b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0);
            request.extend_from_slice(&buf[..n]);
        }
        assert!(request.starts_with(b"SOURCE secret /TEST\r\n"));
        socket.write_all(b"ICY 200 OK\r\n").await.unwrap();

        let mut upload = vec![0u8; frame.len()];
        tokio::time::timeout(Duration::from_secs(2), socket.read_exact(&mut upload))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(upload, frame.as_bytes());
        assert!(station.status().is_connected(EndpointId::Primary));

        station.shutdown();
        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        feeder.abort();
        assert!(!station.status().is_connected(EndpointId::Primary));
    }
}
