//! Endpoint configuration and the collaborator seams the client reads from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// One of the two caster slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointId {
    Primary,
    Secondary,
}

impl EndpointId {
    pub const ALL: [EndpointId; 2] = [EndpointId::Primary, EndpointId::Secondary];

    pub fn index(self) -> usize {
        match self {
            EndpointId::Primary => 0,
            EndpointId::Secondary => 1,
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointId::Primary => f.write_str("Primary"),
            EndpointId::Secondary => f.write_str("Secondary"),
        }
    }
}

/// NTRIP protocol revision used for the upload.
///
/// Serialized as the bare number `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NtripVersion {
    #[default]
    V1,
    V2,
}

impl NtripVersion {
    pub fn number(self) -> u8 {
        match self {
            NtripVersion::V1 => 1,
            NtripVersion::V2 => 2,
        }
    }
}

impl TryFrom<u8> for NtripVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NtripVersion::V1),
            2 => Ok(NtripVersion::V2),
            other => Err(format!("unsupported NTRIP version {}", other)),
        }
    }
}

impl From<NtripVersion> for u8 {
    fn from(version: NtripVersion) -> Self {
        version.number()
    }
}

impl fmt::Display for NtripVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Everything needed to open one caster upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub mountpoint: String,
    /// Used by v2 only.
    pub username: String,
    pub password: String,
    pub version: NtripVersion,
    /// Client name reported in the agent header.
    pub client_name: String,
}

impl EndpointConfig {
    pub fn new(host: impl Into<String>, port: u16, mountpoint: impl Into<String>) -> Self {
        Self {
            enabled: true,
            host: host.into(),
            port,
            mountpoint: mountpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: NtripVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns what makes this configuration unusable, if anything.
    pub fn problem(&self) -> Option<&'static str> {
        if self.host.trim().is_empty() {
            return Some("host is empty");
        }
        if self.port == 0 {
            return Some("port is zero");
        }
        if self.mountpoint.trim().is_empty() {
            return Some("mountpoint is empty");
        }
        if self.version == NtripVersion::V2 && self.username.is_empty() {
            return Some("NTRIP v2 requires a username");
        }
        None
    }
}

/// Source of per-endpoint settings, read at every reconnection sweep.
pub trait SettingsStore: Send + Sync {
    fn endpoint(&self, id: EndpointId) -> EndpointConfig;

    /// Whether the RTCM freshness check gates uploads.
    fn rtcm_check_enabled(&self) -> bool;
}

/// GNSS receiver state consulted by the forwarding gate.
pub trait GnssStatus: Send + Sync {
    fn survey_in_active(&self) -> bool;
}

impl GnssStatus for AtomicBool {
    fn survey_in_active(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Fixed settings, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    pub primary: EndpointConfig,
    pub secondary: EndpointConfig,
    pub rtcm_check: bool,
}

impl StaticSettings {
    pub fn new(primary: EndpointConfig, secondary: EndpointConfig) -> Self {
        Self {
            primary,
            secondary,
            rtcm_check: true,
        }
    }

    pub fn with_rtcm_check(mut self, enabled: bool) -> Self {
        self.rtcm_check = enabled;
        self
    }
}

impl SettingsStore for StaticSettings {
    fn endpoint(&self, id: EndpointId) -> EndpointConfig {
        match id {
            EndpointId::Primary => self.primary.clone(),
            EndpointId::Secondary => self.secondary.clone(),
        }
    }

    fn rtcm_check_enabled(&self) -> bool {
        self.rtcm_check
    }
}

impl SettingsStore for parking_lot::RwLock<StaticSettings> {
    fn endpoint(&self, id: EndpointId) -> EndpointConfig {
        self.read().endpoint(id)
    }

    fn rtcm_check_enabled(&self) -> bool {
        self.read().rtcm_check
    }
}
