#[allow(clippy::module_inception)]
mod scheduler;
pub use scheduler::AutoSendScheduler;

use crate::orchestrator::SendResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whatever performs one send for a device when its timer fires.
#[async_trait]
pub trait SendTarget: Send + Sync {
    async fn send_device(&self, device_id: &str, use_variance: bool) -> SendResult;
}

/// Read-only snapshot of one device's auto-send schedule.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSendStatus {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Epoch milliseconds of the last successful send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sent_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sending: Option<bool>,
}

impl AutoSendStatus {
    pub fn disabled() -> Self {
        Self::default()
    }
}
