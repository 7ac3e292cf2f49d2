#[allow(clippy::module_inception)]
mod orchestrator;
pub use orchestrator::Orchestrator;

use crate::error::SimError;
use crate::producer::{BrokerType, ProducerConfig};
use serde::{Deserialize, Serialize};

/// Normalized outcome of one delivery. Never an error: every failure is
/// folded into `success == false` with a status code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl SendResult {
    pub fn ok(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            status_code,
        }
    }

    pub fn failure(
        message: impl Into<String>,
        error: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            status_code,
        }
    }

    /// Failure carrying the error's HTTP status, or 500 when there is none.
    pub fn from_error(message: impl Into<String>, error: &SimError) -> Self {
        Self::failure(message, error.to_string(), Some(error.status().unwrap_or(500)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrokerAuth {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Where a device's data goes: straight to an HTTP endpoint, or through a
/// message broker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionSettings {
    Http {
        connection_string: String,
    },
    Broker {
        connection_string: String,
        broker_type: BrokerType,
        destination: String,
        #[serde(default)]
        auth: Option<BrokerAuth>,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        ssl: Option<bool>,
    },
}

impl ConnectionSettings {
    /// Producer configuration for the broker variant; `None` for plain HTTP.
    pub fn producer_config(&self) -> Option<ProducerConfig> {
        match self {
            ConnectionSettings::Http { .. } => None,
            ConnectionSettings::Broker {
                connection_string,
                auth,
                timeout_ms,
                ssl,
                ..
            } => {
                let mut config = ProducerConfig::new(connection_string.clone());
                if let Some(auth) = auth {
                    config = config.with_credentials(auth.username.clone(), auth.password.clone());
                }
                config.timeout_ms = *timeout_ms;
                config.ssl = *ssl;
                Some(config)
            }
        }
    }

    /// Short human-readable target, without credentials.
    pub fn describe(&self) -> String {
        match self {
            ConnectionSettings::Http { connection_string } => format!("http {}", connection_string),
            ConnectionSettings::Broker {
                broker_type,
                destination,
                ..
            } => format!("{} destination '{}'", broker_type, destination),
        }
    }
}
