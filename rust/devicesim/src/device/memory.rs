use super::interface::{Device, DeviceStore, HistoryRecorder, MessageRecord, SettingsStore};
use crate::orchestrator::ConnectionSettings;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use tokio::sync::RwLock;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Default)]
pub struct MemoryDeviceStore {
    devices: DashMap<String, Device>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let store = Self::new();
        for device in devices {
            store.devices.insert(device.id.clone(), device);
        }
        store
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn device(&self, device_id: &str) -> Option<Device> {
        self.devices.get(device_id).map(|entry| entry.value().clone())
    }

    async fn devices(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self
            .devices
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    async fn upsert(&self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }
}

/// Per-device message history capped at `limit` entries, evicting the oldest.
pub struct MemoryHistory {
    limit: usize,
    entries: DashMap<String, VecDeque<MessageRecord>>,
}

impl MemoryHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: DashMap::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[async_trait]
impl HistoryRecorder for MemoryHistory {
    async fn record(&self, device_id: &str, record: MessageRecord) {
        let mut entries = self.entries.entry(device_id.to_string()).or_default();
        entries.push_back(record);
        while entries.len() > self.limit {
            entries.pop_front();
        }
    }

    async fn history(&self, device_id: &str) -> Vec<MessageRecord> {
        self.entries
            .get(device_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct StaticSettings {
    settings: RwLock<Option<ConnectionSettings>>,
}

impl StaticSettings {
    pub fn new(settings: Option<ConnectionSettings>) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub async fn set(&self, settings: Option<ConnectionSettings>) {
        *self.settings.write().await = settings;
    }
}

#[async_trait]
impl SettingsStore for StaticSettings {
    async fn active_settings(&self) -> Option<ConnectionSettings> {
        self.settings.read().await.clone()
    }
}
