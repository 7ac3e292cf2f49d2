use crate::device::{Device, DEFAULT_HISTORY_LIMIT};
use crate::error::{Result, SimError};
use crate::orchestrator::ConnectionSettings;
use crate::producer::interface::DEFAULT_TIMEOUT_MS;
use crate::sensor::{generate_payload, SensorCategory, SensorReading};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "SIM_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "simulator.yaml";

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_sample_count() -> usize {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub connection: Option<ConnectionSettings>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub category: SensorCategory,
    pub api_key: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub use_variance: bool,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    #[serde(default)]
    pub payload: Option<Vec<SensorReading>>,
}

impl SimulatorConfig {
    /// Loads from the path in `SIM_CONFIG`, falling back to `simulator.yaml`.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            SimError::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: SimulatorConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(SimError::Configuration(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(SimError::Configuration("device id must not be empty".to_string()));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(SimError::Configuration(format!(
                    "duplicate device id '{}'",
                    device.id
                )));
            }
            if device.interval_ms == 0 {
                return Err(SimError::Configuration(format!(
                    "device '{}' has a zero interval",
                    device.id
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl DeviceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Device as seen by the stores; a missing payload is generated.
    pub fn to_device(&self) -> Device {
        let payload = match &self.payload {
            Some(readings) if !readings.is_empty() => readings.clone(),
            _ => generate_payload(self.category, &self.api_key, self.sample_count).json_data,
        };
        Device {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            category: self.category,
            api_key: self.api_key.clone(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::BrokerType;

    const SAMPLE: &str = r#"
history_limit: 20
connection:
  type: broker
  connection_string: mqtt://localhost:1883
  broker_type: mqtt
  destination: devices/telemetry
  auth:
    username: sim
    password: secret
devices:
  - id: greenhouse-1
    name: Greenhouse
    category: temperature
    api_key: key-1
    interval_ms: 2000
    use_variance: true
    auto_start: true
    sample_count: 3
  - id: door-1
    category: motion
    api_key: key-2
    payload:
      - distance: 4.2
        motion_detected: false
        timestamp: "2024-01-01T00:00:00.000Z"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = SimulatorConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.request_timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert!(matches!(
            config.connection,
            Some(ConnectionSettings::Broker {
                broker_type: BrokerType::Mqtt,
                ..
            })
        ));

        let greenhouse = config.devices[0].to_device();
        assert_eq!(greenhouse.name, "Greenhouse");
        assert_eq!(greenhouse.payload.len(), 3);
        assert_eq!(config.devices[0].interval(), Duration::from_secs(2));

        let door = &config.devices[1];
        assert_eq!(door.interval_ms, 5_000);
        assert!(!door.auto_start);
        let door = door.to_device();
        assert_eq!(door.name, "door-1");
        assert_eq!(door.payload[0].get_f64("distance"), Some(4.2));
    }

    #[test]
    fn test_defaults_for_empty_document() {
        let config = SimulatorConfig::from_yaml("{}").unwrap();
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(config.connection.is_none());
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_rejects_invalid_devices() {
        let duplicate = r#"
devices:
  - { id: a, category: voltage, api_key: k }
  - { id: a, category: voltage, api_key: k }
"#;
        assert!(matches!(
            SimulatorConfig::from_yaml(duplicate),
            Err(SimError::Configuration(_))
        ));

        let zero = "devices:\n  - { id: a, category: custom, api_key: k, interval_ms: 0 }\n";
        assert!(matches!(
            SimulatorConfig::from_yaml(zero),
            Err(SimError::Configuration(_))
        ));

        let unknown_category = "devices:\n  - { id: a, category: humidity, api_key: k }\n";
        assert!(matches!(
            SimulatorConfig::from_yaml(unknown_category),
            Err(SimError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SimulatorConfig::from_file("/nonexistent/simulator.yaml"),
            Err(SimError::Configuration(_))
        ));
    }
}
