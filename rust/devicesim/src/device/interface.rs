use crate::orchestrator::{ConnectionSettings, SendResult};
use crate::sensor::{SensorCategory, SensorPayload, SensorReading};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub category: SensorCategory,
    pub api_key: String,
    /// Current readings; the base that variance is applied to.
    #[serde(default)]
    pub payload: Vec<SensorReading>,
}

impl Device {
    pub fn payload(&self) -> SensorPayload {
        SensorPayload::new(self.api_key.clone(), self.payload.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub status: u16,
    pub message: String,
    pub timestamp: String,
}

/// One delivery as kept in a device's message history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub timestamp: String,
    pub request: SensorPayload,
    pub response: RecordedResponse,
}

impl MessageRecord {
    pub fn new(request: SensorPayload, result: &SendResult) -> Self {
        let sent_at = crate::sensor::variance::now_timestamp();
        let status = result
            .status_code
            .unwrap_or(if result.success { 200 } else { 500 });
        let message = match &result.error {
            Some(error) if !result.success => format!("{}: {}", result.message, error),
            _ => result.message.clone(),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: sent_at.clone(),
            request,
            response: RecordedResponse {
                status,
                message,
                timestamp: sent_at,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSendTrigger {
    pub device_id: String,
    #[serde(default)]
    pub use_realistic_values: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<SendResult> for TriggerResponse {
    fn from(result: SendResult) -> Self {
        Self {
            success: result.success,
            message: result.message,
            error: result.error,
            status: result.status_code,
        }
    }
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn device(&self, device_id: &str) -> Option<Device>;
    async fn devices(&self) -> Vec<Device>;
    async fn upsert(&self, device: Device);
}

#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn record(&self, device_id: &str, record: MessageRecord);
    /// Oldest first.
    async fn history(&self, device_id: &str) -> Vec<MessageRecord>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn active_settings(&self) -> Option<ConnectionSettings>;
}
