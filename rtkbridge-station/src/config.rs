//! Station configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via RTKBRIDGE_CONFIG or --config)
//! 3. Environment variables

use crate::error::ConfigError;
use rtkbridge_ntrip::{EndpointConfig, EndpointId, NtripVersion, TaskConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest caster username the settings accept.
pub const MAX_USERNAME_LEN: usize = 15;

/// Station configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Station identity and gating.
    pub station: StationConfig,
    /// Primary caster.
    pub caster1: CasterConfig,
    /// Secondary caster.
    pub caster2: CasterConfig,
    /// Raw correction byte source.
    pub source: SourceConfig,
    /// NTRIP task timing.
    pub task: TaskSettings,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("RTKBRIDGE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.station.apply_overrides(&lookup);
        self.caster1.apply_overrides("RTKBRIDGE_CASTER1", &lookup);
        self.caster2.apply_overrides("RTKBRIDGE_CASTER2", &lookup);
        self.source.apply_overrides(&lookup);
    }

    /// Rejects enabled casters that could never connect.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, caster, id) in [
            ("caster1", &self.caster1, EndpointId::Primary),
            ("caster2", &self.caster2, EndpointId::Secondary),
        ] {
            if caster.username.chars().count() > MAX_USERNAME_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "{}: username longer than {} characters",
                    name, MAX_USERNAME_LEN
                )));
            }
            if !caster.enabled {
                continue;
            }
            if let Some(problem) = self.endpoint(id).problem() {
                return Err(ConfigError::ValidationError(format!("{}: {}", name, problem)));
            }
        }

        if self.task.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "task.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.task.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "task.channel_capacity must be positive".to_string(),
            ));
        }
        if self.task.report_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "task.report_interval_secs must be positive".to_string(),
            ));
        }
        if self.source.read_buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "source.read_buffer_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint settings as the NTRIP client sees them.
    pub fn endpoint(&self, id: EndpointId) -> EndpointConfig {
        let caster = match id {
            EndpointId::Primary => &self.caster1,
            EndpointId::Secondary => &self.caster2,
        };
        caster.to_endpoint(&self.station.client_name)
    }
}

/// Station identity and gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Name reported to casters in the agent header.
    pub client_name: String,
    /// Stop uploading when correction data goes stale.
    pub rtcm_check: bool,
    /// Initial survey-in state.
    pub survey_in: bool,
    /// Where to write the JSON status report, if anywhere.
    pub status_file: Option<PathBuf>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            client_name: "rtkbridge".to_string(),
            rtcm_check: true,
            survey_in: false,
            status_file: None,
        }
    }
}

impl StationConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("RTKBRIDGE_CLIENT_NAME") {
            self.client_name = name;
        }
        if let Some(check) = lookup("RTKBRIDGE_RTCM_CHECK") {
            self.rtcm_check = parse_bool(&check);
        }
        if let Some(survey) = lookup("RTKBRIDGE_SURVEY_IN") {
            self.survey_in = parse_bool(&survey);
        }
        if let Some(path) = lookup("RTKBRIDGE_STATUS_FILE") {
            self.status_file = Some(PathBuf::from(path));
        }
    }
}

/// One caster slot, keyed like the firmware settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasterConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub mountpoint: String,
    pub username: String,
    pub password: String,
    pub ntrip_version: NtripVersion,
}

impl Default for CasterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 2101,
            mountpoint: String::new(),
            username: String::new(),
            password: String::new(),
            ntrip_version: NtripVersion::V1,
        }
    }
}

impl CasterConfig {
    fn apply_overrides(&mut self, prefix: &str, lookup: &impl Fn(&str) -> Option<String>) {
        let var = |suffix: &str| lookup(&format!("{}_{}", prefix, suffix));

        if let Some(enabled) = var("ENABLED") {
            self.enabled = parse_bool(&enabled);
        }
        if let Some(host) = var("HOST") {
            self.host = host;
        }
        if let Some(port) = var("PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Some(mountpoint) = var("MOUNTPOINT") {
            self.mountpoint = mountpoint;
        }
        if let Some(user) = var("USER") {
            self.username = user;
        }
        if let Some(password) = var("PASSWORD") {
            self.password = password;
        }
        if let Some(version) = var("VERSION") {
            if let Some(version) = version
                .parse::<u8>()
                .ok()
                .and_then(|n| NtripVersion::try_from(n).ok())
            {
                self.ntrip_version = version;
            }
        }
    }

    pub fn to_endpoint(&self, client_name: &str) -> EndpointConfig {
        EndpointConfig {
            enabled: self.enabled,
            host: self.host.trim().to_string(),
            port: self.port,
            mountpoint: self.mountpoint.trim().to_string(),
            username: self.username.clone(),
            password: self.password.clone(),
            version: self.ntrip_version,
            client_name: client_name.to_string(),
        }
    }
}

/// Raw correction byte source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Device node or capture file; stdin when unset.
    pub path: Option<PathBuf>,
    /// Bytes requested per read.
    pub read_buffer_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            read_buffer_size: 1024,
        }
    }
}

impl SourceConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("RTKBRIDGE_SOURCE") {
            self.path = match path.as_str() {
                "" | "-" => None,
                _ => Some(PathBuf::from(path)),
            };
        }
    }
}

/// NTRIP task timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub poll_interval_ms: u64,
    /// Frames queued between the byte source and the task.
    pub channel_capacity: usize,
    pub report_interval_secs: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            channel_capacity: rtkbridge_ntrip::forwarder::FRAME_QUEUE_CAPACITY,
            report_interval_secs: rtkbridge_ntrip::STATUS_REPORT_INTERVAL.as_secs(),
        }
    }
}

impl TaskSettings {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            report_interval: self.report_interval(),
            ..TaskConfig::default()
        }
    }
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
