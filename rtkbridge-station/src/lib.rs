//! # rtkbridge-station
//!
//! Base station wiring for rtkbridge.
//!
//! This crate provides:
//! - YAML and environment configuration
//! - A live, reloadable settings store for the NTRIP client
//! - The survey-in flag consulted by the forwarding gate
//! - The raw byte source feeding the RTCM pipeline
//! - Optional JSON status reports

pub mod config;
pub mod error;
pub mod gnss;
pub mod report;
pub mod settings;
pub mod source;
pub mod station;

pub use config::Config;
pub use error::{ConfigError, StationError};
pub use gnss::SurveyFlag;
pub use report::StatusReport;
pub use settings::LiveSettings;
pub use station::Station;
