use super::{Reading, Sink, SinkError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Hands readings to an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Reading>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Reading>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        self.tx.send(*reading).map_err(|_| SinkError::Closed)
    }
}
