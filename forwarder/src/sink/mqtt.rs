use super::{Reading, ReadingPayload, Sink, SinkError};
use crate::config::MqttSinkConfig;
use async_trait::async_trait;
use log::warn;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use uuid::Uuid;

const REQUEST_CAPACITY: usize = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Publishes each reading as JSON to an MQTT topic.
///
/// Publishing never waits for the broker: when the request queue is full the
/// reading is rejected and the forwarder drops it.
pub struct MqttSink {
    client: AsyncClient,
    topic: String,
    source: String,
}

impl MqttSink {
    /// Creates the sink and returns the event loop that has to be polled for
    /// anything to reach the broker.
    pub fn new(config: &MqttSinkConfig, source: &str) -> (Self, EventLoop) {
        let client_id = format!("battery-forwarder-{}", Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host.as_str(), config.port);
        options.set_keep_alive(config.keep_alive());

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        (
            Self {
                client,
                topic: config.topic.clone(),
                source: source.to_string(),
            },
            eventloop,
        )
    }

    /// Creates the sink and drives its event loop on a background task.
    pub fn spawn(config: &MqttSinkConfig, source: &str) -> Self {
        let (sink, mut eventloop) = Self::new(config, source);
        let broker = format!("{}:{}", config.host, config.port);

        tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!("MQTT connection error ({}): {:?}", broker, err);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        });

        sink
    }
}

#[async_trait]
impl Sink for MqttSink {
    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(&ReadingPayload::new(reading, &self.source))?;
        self.client
            .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)?;

        Ok(())
    }
}
