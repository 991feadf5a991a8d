use anomaly::Thresholds;
use serde::Deserialize;
use std::time::Duration;
use telemetry_protocol::Framing;

/// Environment variable naming the configuration file to load.
pub const CONFIG_PATH_VAR: &str = "FORWARDER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "forwarder/config";
const ENV_PREFIX: &str = "FORWARDER";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listener: ListenerConfig,
    pub sink: SinkConfig,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    pub framing: Framing,
    pub failure_backoff_ms: u64,
    /// How long open connections may keep running after shutdown.
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Http,
    Mqtt,
    Log,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Label identifying this forwarder in delivered readings.
    pub source: String,
    pub http: HttpSinkConfig,
    pub mqtt: MqttSinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSinkConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttSinkConfig {
    pub host: String,
    pub port: u16,
    pub keep_alive_seconds: u64,
    pub topic: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            host: "0.0.0.0".to_string(),
            port: 23456,
            framing: Framing::Raw,
            failure_backoff_ms: 100,
            shutdown_grace_ms: 10_000,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            kind: SinkKind::Http,
            source: "qnx_listener".to_string(),
            http: HttpSinkConfig::default(),
            mqtt: MqttSinkConfig::default(),
        }
    }
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        HttpSinkConfig {
            url: "http://127.0.0.1:8000/api/battery-data".to_string(),
            timeout_seconds: 5,
        }
    }
}

impl Default for MqttSinkConfig {
    fn default() -> Self {
        MqttSinkConfig {
            host: "127.0.0.1".to_string(),
            port: 1883,
            keep_alive_seconds: 30,
            topic: "battery/telemetry".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file and `FORWARDER_*` environment variables.
    ///
    /// The file is `path` if given, else the one named by `FORWARDER_CONFIG`,
    /// else `forwarder/config.toml`. It may be missing, in which case every
    /// value not set through the environment takes its default. Nested keys use
    /// a double underscore, e.g. `FORWARDER_LISTENER__PORT=23456`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let path = path
            .map(str::to_owned)
            .or_else(|| std::env::var(CONFIG_PATH_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn from_toml(contents: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

impl ListenerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl HttpSinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl MqttSinkConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }
}
