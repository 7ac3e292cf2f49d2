use super::interface::{
    AutoSendTrigger, DeviceStore, HistoryRecorder, MessageRecord, SettingsStore, TriggerResponse,
};
use crate::error::SimError;
use crate::orchestrator::{Orchestrator, SendResult};
use crate::scheduler::SendTarget;
use crate::sensor::{add_variance, generate_payload};
use async_trait::async_trait;
use log::{debug, error, warn};
use std::sync::Arc;

/// Turns "send device X now" into an orchestrator call plus a history record.
pub struct DeviceDispatcher {
    devices: Arc<dyn DeviceStore>,
    history: Arc<dyn HistoryRecorder>,
    settings: Arc<dyn SettingsStore>,
    orchestrator: Orchestrator,
}

impl DeviceDispatcher {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        history: Arc<dyn HistoryRecorder>,
        settings: Arc<dyn SettingsStore>,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            devices,
            history,
            settings,
            orchestrator,
        }
    }

    pub async fn send_device(&self, device_id: &str, use_variance: bool) -> SendResult {
        let Some(device) = self.devices.device(device_id).await else {
            warn!("Send requested for unknown device {}", device_id);
            return SendResult::failure(
                "Device not found",
                format!("no device with id '{}'", device_id),
                Some(404),
            );
        };
        let Some(settings) = self.settings.active_settings().await else {
            warn!("No connection settings configured, cannot send device {}", device_id);
            return SendResult::failure(
                "No connection settings configured",
                "configure an HTTP endpoint or a broker first",
                Some(400),
            );
        };

        let base = if device.payload.is_empty() {
            generate_payload(device.category, &device.api_key, 1)
        } else {
            device.payload()
        };
        let payload = if use_variance {
            add_variance(&base, device.category)
        } else {
            base
        };

        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => return SendResult::from_error("Invalid payload", &SimError::from(e)),
        };

        debug!("Sending device {} ({}) via {}", device.id, device.name, settings.describe());
        let result = self.orchestrator.send_device_data(&body, &settings).await;
        self.history
            .record(&device.id, MessageRecord::new(payload, &result))
            .await;
        result
    }

    /// Runs one send for an external trigger. A panic during the send is
    /// reported as a failed trigger.
    pub async fn handle_trigger(self: &Arc<Self>, trigger: AutoSendTrigger) -> TriggerResponse {
        let dispatcher = self.clone();
        let device_id = trigger.device_id.clone();
        let outcome = tokio::spawn(async move {
            dispatcher
                .send_device(&trigger.device_id, trigger.use_realistic_values)
                .await
        })
        .await;

        match outcome {
            Ok(result) => result.into(),
            Err(e) => {
                error!("Trigger for device {} aborted: {}", device_id, e);
                SendResult::failure("Trigger failed", "internal error during send", Some(500)).into()
            }
        }
    }
}

#[async_trait]
impl SendTarget for DeviceDispatcher {
    async fn send_device(&self, device_id: &str, use_variance: bool) -> SendResult {
        DeviceDispatcher::send_device(self, device_id, use_variance).await
    }
}
