//! JSON status file for external status readers.

use crate::error::StationError;
use chrono::{DateTime, Utc};
use rtkbridge_ntrip::{BoardTotals, EndpointSnapshot, StatusBoard};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Everything a status page shows about the uploads.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub endpoints: [EndpointSnapshot; 2],
    pub totals: BoardTotals,
}

impl StatusReport {
    pub fn capture(board: &StatusBoard) -> Self {
        Self {
            generated_at: Utc::now(),
            endpoints: board.snapshots(),
            totals: board.totals(),
        }
    }
}

/// Replaces `path` with the report, via a sibling temp file.
pub fn write_report(path: &Path, report: &StatusReport) -> Result<(), StationError> {
    let json = serde_json::to_vec_pretty(report)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Rewrites the status file every `interval` until shutdown.
pub async fn run_reporter(
    board: Arc<StatusBoard>,
    path: PathBuf,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = write_report(&path, &StatusReport::capture(&board)) {
                    tracing::warn!(path = %path.display(), "Failed to write status report: {}", e);
                }
            }
        }
    }
}
