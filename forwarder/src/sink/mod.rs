pub mod channel;
pub mod http;
pub mod logging;
pub mod mqtt;

pub use channel::ChannelSink;
pub use http::HttpSink;
pub use logging::LogSink;
pub use mqtt::MqttSink;

use crate::config::{SinkConfig, SinkKind};
use anomaly::{AnomalyWarning, Thresholds};
use async_trait::async_trait;
use serde::Serialize;
use std::{fmt, sync::Arc};
use telemetry_protocol::TelemetryRecord;
use thiserror::Error;

/// A decoded record together with its classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub record: TelemetryRecord,
    pub warning: Option<AnomalyWarning>,
}

impl Reading {
    pub fn classify(record: TelemetryRecord, thresholds: &Thresholds) -> Self {
        Reading {
            record,
            warning: thresholds.classify(&record),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.record;
        write!(
            f,
            "Time={:.1}s, Voltage={:.2}V, Current={:.2}A, Temp={:.1}°C",
            r.timestamp, r.pack_voltage, r.pack_current, r.cell_temperature
        )?;

        if let Some(warning) = &self.warning {
            write!(f, " [{}]", warning)?;
        }

        Ok(())
    }
}

/// JSON body delivered to the ingestion API and MQTT subscribers.
#[derive(Debug, Serialize)]
pub struct ReadingPayload<'a> {
    pub timestamp: f32,
    pub pack_voltage: f32,
    pub pack_current: f32,
    pub cell_temp: f32,
    pub source: &'a str,
    pub warning: Option<String>,
    pub severity: Option<&'static str>,
}

impl<'a> ReadingPayload<'a> {
    pub fn new(reading: &Reading, source: &'a str) -> Self {
        ReadingPayload {
            timestamp: reading.record.timestamp,
            pack_voltage: reading.record.pack_voltage,
            pack_current: reading.record.pack_current,
            cell_temp: reading.record.cell_temperature,
            source,
            warning: reading.warning.map(|w| w.to_string()),
            severity: reading.warning.map(|w| w.severity().as_str()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("mqtt publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sink is closed")]
    Closed,
}

/// Downstream consumer of classified readings.
///
/// Delivery is best-effort: the forwarder logs and drops a reading whose
/// delivery fails, it never retries.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError>;
}

/// Builds the sink selected in the configuration.
///
/// The MQTT sink spawns its event loop, so this must run inside a tokio runtime.
pub fn from_config(config: &SinkConfig) -> Result<Arc<dyn Sink>, SinkError> {
    let sink: Arc<dyn Sink> = match config.kind {
        SinkKind::Http => Arc::new(HttpSink::new(&config.http, &config.source)?),
        SinkKind::Mqtt => Arc::new(MqttSink::spawn(&config.mqtt, &config.source)),
        SinkKind::Log => Arc::new(LogSink::new(&config.source)),
    };

    Ok(sink)
}
