use crate::{
    error::TransportError,
    sink::{Reading, Sink},
    stats::SessionStats,
};
use anomaly::{Severity, Thresholds};
use log::{debug, error, info, warn};
use std::{sync::Arc, time::Duration};
use telemetry_protocol::{Framing, ReadOutcome, RecordReader};
use tokio::io::AsyncRead;

/// Everything a connection needs to turn bytes into delivered readings.
#[derive(Clone)]
pub struct Pipeline {
    pub framing: Framing,
    pub thresholds: Arc<Thresholds>,
    pub sink: Arc<dyn Sink>,
    /// Pause after a failed delivery before reading the next record.
    pub failure_backoff: Duration,
}

/// Reads records from `stream` until the peer goes away, classifying each one
/// and handing it to the sink in arrival order.
///
/// A record cut short by the peer closing is reported and nothing is
/// forwarded for it. Read errors end the connection as well; the caller goes
/// back to accepting.
pub async fn forward_stream<R>(stream: R, peer: &str, pipeline: &Pipeline) -> SessionStats
where
    R: AsyncRead + Unpin,
{
    let mut reader = RecordReader::new(stream, pipeline.framing);
    let mut stats = SessionStats::default();

    loop {
        match reader.next_record().await {
            Ok(ReadOutcome::Record(record)) => {
                let reading = Reading::classify(record, &pipeline.thresholds);
                stats.observe(&reading);
                log_reading(peer, &reading);

                if let Err(err) = pipeline.sink.deliver(&reading).await {
                    stats.delivery_failures += 1;
                    warn!(
                        "{}: dropping reading at t={:.1}s: {}",
                        peer, record.timestamp, err
                    );
                    if !pipeline.failure_backoff.is_zero() {
                        tokio::time::sleep(pipeline.failure_backoff).await;
                    }
                }
            }
            Ok(ReadOutcome::Closed) => {
                info!("{}: client disconnected", peer);
                break;
            }
            Ok(ReadOutcome::Truncated(n)) => {
                stats.truncated += 1;
                error!(
                    "{}: connection closed with {} bytes of an unfinished record, dropping it",
                    peer, n
                );
                break;
            }
            Err(err) => {
                error!("{}: {}", peer, TransportError::Io(err));
                break;
            }
        }
    }

    if reader.discarded() > 0 {
        warn!("{}: discarded {} unframed bytes", peer, reader.discarded());
    }

    stats
}

fn log_reading(peer: &str, reading: &Reading) {
    match reading.warning.map(|w| w.severity()) {
        None => debug!("{}: {}", peer, reading),
        Some(Severity::Warning) => warn!("{}: {}", peer, reading),
        Some(Severity::Critical) => error!("{}: {}", peer, reading),
    }
}
