//! Live settings store backed by the configuration file.

use crate::config::Config;
use crate::error::ConfigError;
use parking_lot::RwLock;
use rtkbridge_ntrip::{EndpointConfig, EndpointId, SettingsStore};
use std::path::PathBuf;

/// Current configuration, replaceable at runtime.
///
/// The NTRIP task re-reads endpoint settings on every reconnection sweep, so
/// a reload takes effect at the next attempt.
pub struct LiveSettings {
    config: RwLock<Config>,
    path: Option<PathBuf>,
}

impl LiveSettings {
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self {
            config: RwLock::new(config),
            path,
        }
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Installs `config` if it validates.
    pub fn replace(&self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    /// Re-reads the backing file and environment.
    ///
    /// Returns `false` when there is no file to read. A file that fails to
    /// parse or validate leaves the current settings in place.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let mut config = Config::from_file(path)?;
        config.apply_env_overrides();
        self.replace(config)?;
        tracing::info!(path = %path.display(), "Settings reloaded");
        Ok(true)
    }
}

impl SettingsStore for LiveSettings {
    fn endpoint(&self, id: EndpointId) -> EndpointConfig {
        self.config.read().endpoint(id)
    }

    fn rtcm_check_enabled(&self) -> bool {
        self.config.read().station.rtcm_check
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_store() {
        let mut config = Config::default();
        config.caster1.enabled = true;
        config.caster1.host = "a.example.com".into();
        config.caster1.mountpoint = "A".into();
        config.station.rtcm_check = false;

        let settings = LiveSettings::new(config, None);
        let endpoint = settings.endpoint(EndpointId::Primary);
        assert!(endpoint.enabled);
        assert_eq!(endpoint.host, "a.example.com");
        assert!(!settings.endpoint(EndpointId::Secondary).enabled);
        assert!(!settings.rtcm_check_enabled());
    }

    #[test]
    fn test_reload_without_file() {
        let settings = LiveSettings::new(Config::default(), None);
        assert!(!settings.reload().unwrap());
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtkbridge.yaml");
        Config::default().save(&path).unwrap();

        let settings = LiveSettings::new(Config::from_file(&path).unwrap(), Some(path.clone()));
        assert!(!settings.endpoint(EndpointId::Secondary).enabled);

        std::fs::write(
            &path,
            "caster2:\n  enabled: true\n  host: b.example.com\n  mountpoint: B\n",
        )
        .unwrap();
        assert!(settings.reload().unwrap());
        assert!(settings.endpoint(EndpointId::Secondary).enabled);
        assert_eq!(settings.config().caster2.host, "b.example.com");
    }

    #[test]
    fn test_invalid_reload_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtkbridge.yaml");
        std::fs::write(&path, "caster1:\n  enabled: true\n  host: a\n  mountpoint: A\n").unwrap();
        let settings = LiveSettings::new(Config::from_file(&path).unwrap(), Some(path.clone()));

        // Enabled with no mountpoint
        std::fs::write(&path, "caster1:\n  enabled: true\n  host: a\n").unwrap();
        assert!(settings.reload().is_err());
        assert_eq!(settings.endpoint(EndpointId::Primary).mountpoint, "A");
    }
}
