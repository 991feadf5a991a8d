use super::{Reading, ReadingPayload, Sink, SinkError};
use crate::config::HttpSinkConfig;
use async_trait::async_trait;
use log::debug;

/// Posts each reading as JSON to the ingestion API.
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    source: String,
}

impl HttpSink {
    pub fn new(config: &HttpSinkConfig, source: &str) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            source: source.to_string(),
        })
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        let payload = ReadingPayload::new(reading, &self.source);
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Reading at t={:.1}s accepted by {}", reading.record.timestamp, self.url);
        Ok(())
    }
}
