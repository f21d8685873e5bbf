//! Client configuration, loaded from TOML.
//!
//! Every section is optional: a missing table or key takes its default.
//!
//! ```toml
//! credentials_path = "/var/lib/iotwatch/credentials.json"
//!
//! [api]
//! base_url = "https://iot.example.com"
//!
//! [broker]
//! host = "broker.example.com"
//! topic = "sensors/temperature"
//!
//! [telemetry.backoff]
//! max_attempts = 8
//! ```

use std::path::{Path, PathBuf};

use iotwatch_api::ApiConfig;
use iotwatch_session::{FileCredentialStore, SessionConfig};
use iotwatch_telemetry::TelemetryConfig;
use iotwatch_transport::MqttConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::IotWatchError;

/// Broker connection settings plus the topic readings are published on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    #[serde(flatten)]
    pub connection: MqttConfig,
    pub topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            connection: MqttConfig::default(),
            topic: TelemetryConfig::default().topic,
        }
    }
}

/// Everything needed to build an [`IotWatch`](crate::IotWatch).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub broker: BrokerConfig,
    pub session: SessionConfig,
    pub telemetry: TelemetryConfig,
    /// Where the bearer token is persisted. Defaults to the platform
    /// config directory.
    pub credentials_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, IotWatchError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IotWatchError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Clamps nonsensical values, logging a warning for each fix.
    ///
    /// The broker topic wins over `telemetry.topic`: it is the one users
    /// set next to the broker address.
    pub fn validated(mut self) -> Self {
        self.telemetry = self.telemetry.validated();
        if self.broker.topic.trim().is_empty() {
            warn!("broker topic is empty, using the default");
            self.broker.topic = BrokerConfig::default().topic;
        }
        self.telemetry.topic = self.broker.topic.clone();
        if self.api.request_timeout_ms == 0 {
            warn!("request_timeout_ms is 0, using the default");
            self.api.request_timeout_ms = ApiConfig::default().request_timeout_ms;
        }
        if self.session.validation_timeout_ms == 0 {
            warn!("validation_timeout_ms is 0, using the default");
            self.session.validation_timeout_ms =
                SessionConfig::default().validation_timeout_ms;
        }
        self
    }

    /// The configured credentials file, or the platform default.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.credentials_path
            .clone()
            .or_else(FileCredentialStore::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_str_empty_gives_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api.base_url, "http://localhost:3000");
        assert_eq!(config.broker.connection.port, 1883);
        assert_eq!(config.broker.topic, "sensors/temperature");
        assert_eq!(config.session.token_key, "authToken");
        assert_eq!(config.telemetry.backoff.max_attempts, 5);
    }

    #[test]
    fn test_from_toml_str_partial_sections_merge_with_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            credentials_path = "/tmp/creds.json"

            [api]
            base_url = "https://iot.example.com"

            [broker]
            host = "broker.example.com"
            username = "watcher"
            topic = "lab/temp"

            [telemetry.backoff]
            max_attempts = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://iot.example.com");
        assert_eq!(config.api.request_timeout_ms, 10_000);
        assert_eq!(config.broker.connection.host, "broker.example.com");
        assert_eq!(config.broker.connection.username.as_deref(), Some("watcher"));
        assert_eq!(config.broker.connection.port, 1883);
        assert_eq!(config.broker.topic, "lab/temp");
        assert_eq!(config.telemetry.backoff.max_attempts, 8);
        assert_eq!(config.telemetry.backoff.base_delay_ms, 1_000);
        assert_eq!(
            config.credentials_path(),
            Some(PathBuf::from("/tmp/creds.json"))
        );
    }

    #[test]
    fn test_from_toml_str_wrong_type_is_config_error() {
        let err = ClientConfig::from_toml_str("[broker]\nport = \"high\"").unwrap_err();
        assert!(matches!(err, IotWatchError::Config(_)));
    }

    #[test]
    fn test_validated_copies_broker_topic_and_clamps() {
        let mut config = ClientConfig::default();
        config.broker.topic = "lab/temp".into();
        config.telemetry.backoff.jitter = 7.0;
        config.telemetry.backoff.max_attempts = 0;
        config.api.request_timeout_ms = 0;

        let config = config.validated();
        assert_eq!(config.telemetry.topic, "lab/temp");
        assert_eq!(config.telemetry.backoff.jitter, 1.0);
        assert_eq!(config.telemetry.backoff.max_attempts, 1);
        assert_eq!(config.api.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_validated_empty_topic_restores_default() {
        let mut config = ClientConfig::default();
        config.broker.topic = "  ".into();
        assert_eq!(config.validated().telemetry.topic, "sensors/temperature");
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iotwatch.toml");
        tokio::fs::write(&path, "[session]\nvalidation_timeout_ms = 500\n")
            .await
            .unwrap();

        let config = ClientConfig::load(&path).await.unwrap();
        assert_eq!(config.session.validation_timeout_ms, 500);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(dir.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, IotWatchError::Io(_)));
    }
}
