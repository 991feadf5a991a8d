use super::{Reading, Sink, SinkError};
use async_trait::async_trait;
use log::info;

/// Writes readings to the log instead of delivering them anywhere.
pub struct LogSink {
    source: String,
}

impl LogSink {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
        }
    }
}

#[async_trait]
impl Sink for LogSink {
    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        info!("[{}] {}", self.source, reading);
        Ok(())
    }
}
