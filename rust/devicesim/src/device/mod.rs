pub mod dispatcher;
pub mod interface;
pub mod memory;

pub use dispatcher::DeviceDispatcher;
pub use interface::{
    AutoSendTrigger, Device, DeviceStore, HistoryRecorder, MessageRecord, RecordedResponse,
    SettingsStore, TriggerResponse,
};
pub use memory::{MemoryDeviceStore, MemoryHistory, StaticSettings, DEFAULT_HISTORY_LIMIT};
