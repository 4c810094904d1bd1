//! rtkbridge - RTCM3 correction forwarder
//!
//! Decodes an RTCM3 byte stream and uploads verified frames to up to two NTRIP
//! casters.

use rtkbridge_ntrip::EndpointId;
use rtkbridge_station::{Config, Station};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if RTKBRIDGE_CONFIG is set, then env overrides)
    let config_path = std::env::var("RTKBRIDGE_CONFIG").ok().map(PathBuf::from);
    let config = match Config::load() {
        Ok(c) => {
            if let Some(path) = &config_path {
                tracing::info!("Loaded config from {}", path.display());
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    tracing::info!("Starting rtkbridge {}", rtkbridge_ntrip::AGENT_VERSION);
    for id in EndpointId::ALL {
        let endpoint = config.endpoint(id);
        if endpoint.enabled {
            tracing::info!(
                "  {} caster: {}:{}/{} (NTRIP {})",
                id,
                endpoint.host,
                endpoint.port,
                endpoint.mountpoint,
                endpoint.version
            );
        } else {
            tracing::info!("  {} caster: disabled", id);
        }
    }
    match &config.source.path {
        Some(path) => tracing::info!("  Source: {}", path.display()),
        None => tracing::info!("  Source: stdin"),
    }
    tracing::info!(
        "  RTCM check: {}",
        if config.station.rtcm_check { "enabled" } else { "disabled" }
    );

    let station = match Station::new(config, config_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    // Spawn shutdown signal handler
    let shutdown_station = station.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping...");
        shutdown_station.shutdown();
    });

    // Reload settings on SIGHUP
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let reload_station = station.clone();
        let mut hangup = signal(SignalKind::hangup())?;
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                match reload_station.reload() {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!("SIGHUP ignored: no config file to reload"),
                    Err(e) => tracing::error!("Settings reload failed: {}", e),
                }
            }
        });
    }

    // Run until the source ends or shutdown
    station.run().await?;

    let totals = station.status().totals();
    tracing::info!(
        "Stopped after forwarding {} frames ({} bytes)",
        totals.frames_forwarded,
        totals.total_bytes_forwarded
    );
    Ok(())
}
