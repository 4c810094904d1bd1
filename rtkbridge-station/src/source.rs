//! Raw correction byte source.

use crate::config::SourceConfig;
use crate::error::StationError;
use rtkbridge_rtcm::{FrameSink, RtcmPipeline};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;

/// Any readable byte stream.
pub type ByteSource = Box<dyn AsyncRead + Unpin + Send>;

/// Opens the configured device or file, or stdin.
pub async fn open(config: &SourceConfig) -> Result<ByteSource, StationError> {
    match &config.path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| StationError::SourceOpen(path.clone(), e))?;
            tracing::info!(path = %path.display(), "Reading corrections from file");
            Ok(Box::new(file))
        }
        None => {
            tracing::info!("Reading corrections from stdin");
            Ok(Box::new(tokio::io::stdin()))
        }
    }
}

/// Feeds `reader` through `pipeline` until end of stream or shutdown.
///
/// Returns the number of bytes consumed.
pub async fn pump<R, S>(
    mut reader: R,
    pipeline: &mut RtcmPipeline<S>,
    buffer_size: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Result<u64, StationError>
where
    R: AsyncRead + Unpin,
    S: FrameSink,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    tracing::info!(bytes = total, "Correction source reached end of stream");
                    break;
                }
                total += n as u64;
                pipeline.process(&buf[..n]);
            }
        }
    }

    let stats = pipeline.stats();
    tracing::debug!(
        bytes = stats.bytes_in,
        forwarded = stats.frames_forwarded,
        filtered = stats.frames_filtered,
        errors = stats.errors(),
        "Correction source stopped"
    );
    Ok(total)
}
