//! Command execution.

use crate::Commands;
use colored::Colorize;
use rtkbridge_ntrip::handshake::build_request;
use rtkbridge_ntrip::{
    auth, AttemptOutcome, EndpointId, GateDecision, StatusBoard, Supervisor, SupervisorConfig,
};
use rtkbridge_rtcm::{Frame, FrameSink, RtcmPipeline};
use rtkbridge_station::Config;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub async fn execute(cmd: Commands, config_path: Option<&Path>) -> CliResult<String> {
    match cmd {
        Commands::Check { file, json } => {
            let data = std::fs::read(&file)?;
            let summary = check_capture(&data);
            if json {
                Ok(serde_json::to_string_pretty(&summary)?)
            } else {
                Ok(format_summary(&summary))
            }
        }

        Commands::AuthHeader { username, password } => {
            Ok(auth::authorization_header(&username, &password))
        }

        Commands::Frame { payload } => {
            let bytes = hex::decode(payload.trim())?;
            let frame = Frame::encode(&bytes)?;
            Ok(hex::encode_upper(frame.as_bytes()))
        }

        Commands::Request { caster, reveal } => {
            let config = load_config(config_path)?;
            let mut endpoint = config.endpoint(slot(caster)?);
            if !reveal && !endpoint.password.is_empty() {
                endpoint.password = "****".to_string();
            }
            let request = String::from_utf8_lossy(&build_request(&endpoint)).into_owned();
            Ok(request.replace("\r\n", "\\r\\n\n").trim_end().to_string())
        }

        Commands::Probe { caster } => {
            let config = load_config(config_path)?;
            let id = slot(caster)?;
            let endpoint = config.endpoint(id).with_enabled(true);
            let board = Arc::new(StatusBoard::new());
            let mut supervisor = Supervisor::new(id, board, SupervisorConfig::default());

            match supervisor.try_connect(&endpoint, GateDecision::Admit).await {
                AttemptOutcome::Connected => {
                    supervisor.disconnect().await;
                    Ok(format!(
                        "{} {}:{}/{} ({})",
                        "Accepted".green(),
                        endpoint.host,
                        endpoint.port,
                        endpoint.mountpoint.cyan(),
                        endpoint.version
                    ))
                }
                AttemptOutcome::Failed(err) => Err(err.into()),
                other => Err(format!("unexpected probe outcome: {:?}", other).into()),
            }
        }

        Commands::Config => {
            let mut config = load_config(config_path)?;
            config.validate()?;
            for caster in [&mut config.caster1, &mut config.caster2] {
                if !caster.password.is_empty() {
                    caster.password = "****".to_string();
                }
            }
            Ok(serde_yaml::to_string(&config)?)
        }
    }
}

fn load_config(path: Option<&Path>) -> CliResult<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

fn slot(caster: u8) -> CliResult<EndpointId> {
    match caster {
        1 => Ok(EndpointId::Primary),
        2 => Ok(EndpointId::Secondary),
        n => Err(format!("caster must be 1 or 2, got {}", n).into()),
    }
}

struct Discard;

impl FrameSink for Discard {
    fn forward(&mut self, _frame: &Frame) {}
}

/// Decoder results for one capture.
#[derive(Debug, Serialize)]
pub struct CaptureSummary {
    pub bytes: u64,
    pub frames_forwarded: u64,
    pub frames_filtered: u64,
    pub crc_errors: u64,
    pub length_errors: u64,
    pub overflows: u64,
    pub messages: Vec<MessageSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessageSummary {
    pub msg_type: u16,
    pub count: u64,
    pub bytes: u64,
}

pub fn check_capture(data: &[u8]) -> CaptureSummary {
    let mut pipeline = RtcmPipeline::new(Discard);
    pipeline.process(data);

    let stats = pipeline.stats();
    CaptureSummary {
        bytes: stats.bytes_in,
        frames_forwarded: stats.frames_forwarded,
        frames_filtered: stats.frames_filtered,
        crc_errors: stats.crc_errors,
        length_errors: stats.length_errors,
        overflows: stats.overflows,
        messages: pipeline
            .messages()
            .iter()
            .map(|(msg_type, s)| MessageSummary {
                msg_type,
                count: s.count,
                bytes: s.bytes,
            })
            .collect(),
    }
}

fn format_summary(summary: &CaptureSummary) -> String {
    let mut lines = vec![format!(
        "{} bytes, {} frames forwarded, {} filtered",
        summary.bytes, summary.frames_forwarded, summary.frames_filtered
    )];

    let errors = summary.crc_errors + summary.length_errors + summary.overflows;
    if errors == 0 {
        lines.push("No framing errors".green().to_string());
    } else {
        lines.push(format!(
            "{}: {} CRC, {} length, {} overflow",
            "Errors".red(),
            summary.crc_errors,
            summary.length_errors,
            summary.overflows
        ));
    }

    if !summary.messages.is_empty() {
        lines.push(String::new());
        lines.push(format!("{:>6}  {:>8}  {:>10}", "TYPE", "COUNT", "BYTES").bold().to_string());
        for m in &summary.messages {
            lines.push(format!("{:>6}  {:>8}  {:>10}", m.msg_type, m.count, m.bytes));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> Vec<u8> {
        let mut data = vec![0x55, 0xAA];
        data.extend_from_slice(Frame::encode(&[0x3E, 0xD0, 1, 2]).unwrap().as_bytes());
        data.extend_from_slice(Frame::encode(&[0x3E, 0xD0, 3, 4]).unwrap().as_bytes());
        // Empty GLONASS biases message, filtered
        data.extend_from_slice(Frame::encode(&[0x4C, 0xE0, 0, 0]).unwrap().as_bytes());
        data
    }

    #[test]
    fn test_check_capture() {
        let summary = check_capture(&capture());
        assert_eq!(summary.frames_forwarded, 2);
        assert_eq!(summary.frames_filtered, 1);
        assert_eq!(summary.crc_errors, 0);
        assert_eq!(summary.messages.len(), 1);
        assert_eq!(summary.messages[0].msg_type, 1005);
        assert_eq!(summary.messages[0].count, 2);

        let text = format_summary(&summary);
        assert!(text.contains("2 frames forwarded, 1 filtered"));
        assert!(text.contains("1005"));
    }

    #[tokio::test]
    async fn test_frame_command() {
        let out = execute(
            Commands::Frame {
                payload: String::new(),
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(out, "D3000047EA4B");

        let out = execute(
            Commands::Frame {
                payload: "3ed0".into(),
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(out, "D300023ED0A4E000");
    }

    #[tokio::test]
    async fn test_auth_header_command() {
        let out = execute(
            Commands::AuthHeader {
                username: "user".into(),
                password: "pass123".into(),
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(out, "Basic dXNlcjpwYXNzMTIz");
    }

    #[tokio::test]
    async fn test_request_masks_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtkbridge.yaml");
        std::fs::write(
            &path,
            "caster1:\n  enabled: true\n  host: caster.example.com\n  mountpoint: M\n  password: hunter2\n",
        )
        .unwrap();

        let out = execute(
            Commands::Request {
                caster: 1,
                reveal: false,
            },
            Some(&path),
        )
        .await
        .unwrap();
        assert!(out.starts_with("SOURCE **** /M\\r\\n"));
        assert!(!out.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_bad_caster_slot() {
        let result = execute(
            Commands::Probe { caster: 3 },
            None,
        )
        .await;
        assert!(result.is_err());
    }
}
