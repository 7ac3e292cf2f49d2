use crate::error::{Result, SimError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Uniform lifecycle shared by every broker producer.
///
/// A producer serves exactly one `connect` → `send` → `disconnect` cycle and is
/// then dropped. All methods take `&self` so that concurrent `connect` calls can
/// share one in-flight attempt.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Establishes the transport. Returns immediately when already connected.
    async fn connect(&self) -> Result<()>;

    /// Best-effort teardown. Never fails and always leaves the producer
    /// disconnected. Waits for an in-flight `connect` to settle first.
    async fn disconnect(&self);

    /// Performs exactly one publish attempt.
    async fn send(&self, destination: &str, message: &str) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn broker_type(&self) -> BrokerType;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerType {
    Mqtt,
    #[serde(alias = "rabbitmq")]
    Amqp,
    /// Kafka reached through its HTTP REST proxy.
    Kafka,
}

impl BrokerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerType::Mqtt => "mqtt",
            BrokerType::Amqp => "amqp",
            BrokerType::Kafka => "kafka",
        }
    }
}

impl fmt::Display for BrokerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub connection_string: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ssl: Option<bool>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ProducerConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS).max(1))
    }

    pub fn ssl_enabled(&self) -> bool {
        self.ssl.unwrap_or(false)
    }

    pub fn client_id_or_default(&self) -> String {
        match &self.client_id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                format!("devicesim-{}", &suffix[..8])
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(SimError::Configuration(
                "connection string is required".to_string(),
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(SimError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
