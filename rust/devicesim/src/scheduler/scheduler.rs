use super::{AutoSendStatus, SendTarget};
use crate::error::{Result, SimError};
use crate::orchestrator::SendResult;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const NEVER_SENT: i64 = 0;

/// Busy guard and last success time of one device.
#[derive(Clone)]
struct SendSlot {
    is_sending: Arc<AtomicBool>,
    last_sent_at: Arc<AtomicI64>,
}

impl SendSlot {
    fn new() -> Self {
        Self {
            is_sending: Arc::new(AtomicBool::new(false)),
            last_sent_at: Arc::new(AtomicI64::new(NEVER_SENT)),
        }
    }

    fn is_busy(&self) -> bool {
        self.is_sending.load(Ordering::SeqCst)
    }
}

struct AutoSendState {
    interval: Duration,
    use_variance: bool,
    generation: u64,
    cancel: CancellationToken,
    timer: JoinHandle<()>,
}

#[derive(Clone)]
struct Tick {
    device_id: String,
    use_variance: bool,
    generation: u64,
}

struct SchedulerInner {
    target: Arc<dyn SendTarget>,
    states: Mutex<HashMap<String, AutoSendState>>,
    /// One slot per device that is running or still has a send in flight.
    /// Outlives the device's state so a stop followed by a start cannot
    /// overlap with the earlier send. Only changed while `states` is locked.
    slots: DashMap<String, SendSlot>,
    generation: AtomicU64,
    sends: TaskTracker,
}

/// Per-device repeating sends with a skip-if-busy guard.
///
/// A device is either stopped (no entry) or running (exactly one armed timer).
/// The first failed send stops that device's schedule.
#[derive(Clone)]
pub struct AutoSendScheduler {
    inner: Arc<SchedulerInner>,
}

impl AutoSendScheduler {
    pub fn new(target: Arc<dyn SendTarget>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                target,
                states: Mutex::new(HashMap::new()),
                slots: DashMap::new(),
                generation: AtomicU64::new(0),
                sends: TaskTracker::new(),
            }),
        }
    }

    /// Arms the device's timer and fires one send immediately. Restarts the
    /// schedule if the device is already running. The immediate send is
    /// skipped while an earlier send for the device is still in flight.
    pub async fn start(&self, device_id: &str, interval: Duration, use_variance: bool) -> Result<()> {
        if interval.is_zero() {
            return Err(SimError::Configuration(format!(
                "auto-send interval for device {} must be greater than zero",
                device_id
            )));
        }

        let mut states = self.inner.states.lock().await;
        if let Some(previous) = states.remove(device_id) {
            previous.cancel.cancel();
            info!("Restarting auto-send for device {}", device_id);
        }
        self.inner
            .slots
            .entry(device_id.to_string())
            .or_insert_with(SendSlot::new);

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let tick = Tick {
            device_id: device_id.to_string(),
            use_variance,
            generation,
        };
        let timer = tokio::spawn(run_timer(
            Arc::downgrade(&self.inner),
            tick,
            interval,
            cancel.clone(),
        ));

        states.insert(
            device_id.to_string(),
            AutoSendState {
                interval,
                use_variance,
                generation,
                cancel,
                timer,
            },
        );
        info!(
            "Auto-send started for device {} every {}ms (variance: {})",
            device_id,
            interval.as_millis(),
            use_variance
        );
        Ok(())
    }

    /// Returns false when the device was not running. A send already in flight
    /// is not aborted.
    pub async fn stop(&self, device_id: &str) -> bool {
        let mut states = self.inner.states.lock().await;
        match states.remove(device_id) {
            Some(state) => {
                state.cancel.cancel();
                self.inner.forget_idle_slot(&states, device_id);
                info!("Auto-send stopped for device {}", device_id);
                true
            }
            None => false,
        }
    }

    pub async fn status(&self, device_id: &str) -> AutoSendStatus {
        let states = self.inner.states.lock().await;
        match states.get(device_id) {
            Some(state) => {
                let slot = self.inner.slots.get(device_id);
                let last_sent_at = slot
                    .as_ref()
                    .map_or(NEVER_SENT, |slot| slot.last_sent_at.load(Ordering::SeqCst));
                AutoSendStatus {
                    enabled: true,
                    interval_ms: Some(state.interval.as_millis() as u64),
                    last_sent_at: (last_sent_at != NEVER_SENT).then_some(last_sent_at),
                    is_sending: Some(slot.as_ref().is_some_and(|slot| slot.is_busy())),
                }
            }
            None => AutoSendStatus::disabled(),
        }
    }

    pub async fn running_devices(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.states.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cancels every timer, then waits for dispatched sends to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, AutoSendState)> =
            self.inner.states.lock().await.drain().collect();
        for (device_id, state) in &drained {
            debug!(
                "Cancelling auto-send for device {} (variance: {})",
                device_id, state.use_variance
            );
            state.cancel.cancel();
        }
        for (_, state) in drained {
            let _ = state.timer.await;
        }

        self.inner.sends.close();
        self.inner.sends.wait().await;
        self.inner.sends.reopen();

        let states = self.inner.states.lock().await;
        self.inner
            .slots
            .retain(|device_id, slot| states.contains_key(device_id) || slot.is_busy());
        info!("Auto-send scheduler shut down");
    }
}

impl SchedulerInner {
    fn dispatch(self: &Arc<Self>, tick: &Tick) {
        let Some(slot) = self.slots.get(&tick.device_id).map(|slot| slot.value().clone()) else {
            debug!("Device {} has no schedule, dropping tick", tick.device_id);
            return;
        };
        if slot
            .is_sending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Device {} is still sending, skipping tick", tick.device_id);
            return;
        }

        let inner = self.clone();
        let tick = tick.clone();
        self.sends.spawn(async move {
            let target = inner.target.clone();
            let device_id = tick.device_id.clone();
            let use_variance = tick.use_variance;
            let outcome =
                tokio::spawn(async move { target.send_device(&device_id, use_variance).await })
                    .await;
            let result = outcome.unwrap_or_else(|e| {
                SendResult::failure("Auto-send failed", format!("send task aborted: {}", e), Some(500))
            });

            if result.success {
                slot.last_sent_at
                    .store(chrono::Utc::now().timestamp_millis(), Ordering::SeqCst);
            } else {
                warn!(
                    "Auto-send for device {} failed, stopping: {}",
                    tick.device_id,
                    result.error.as_deref().unwrap_or(&result.message)
                );
                // released only after the stop so no tick can slip in between
                inner.stop_generation(&tick.device_id, tick.generation).await;
            }
            slot.is_sending.store(false, Ordering::SeqCst);

            let states = inner.states.lock().await;
            inner.forget_idle_slot(&states, &tick.device_id);
        });
    }

    /// Drops the slot of a stopped device once nothing is sending through it.
    fn forget_idle_slot(&self, states: &HashMap<String, AutoSendState>, device_id: &str) {
        if !states.contains_key(device_id) {
            self.slots.remove_if(device_id, |_, slot| !slot.is_busy());
        }
    }

    /// Stops the device only if the failing send belongs to its current schedule.
    async fn stop_generation(&self, device_id: &str, generation: u64) {
        let mut states = self.states.lock().await;
        if states
            .get(device_id)
            .is_some_and(|state| state.generation == generation)
        {
            if let Some(state) = states.remove(device_id) {
                state.cancel.cancel();
            }
        } else {
            debug!(
                "Ignoring failure from superseded schedule {} of device {}",
                generation, device_id
            );
        }
    }
}

async fn run_timer(
    inner: Weak<SchedulerInner>,
    tick: Tick,
    interval: Duration,
    cancel: CancellationToken,
) {
    match inner.upgrade() {
        Some(inner) if !cancel.is_cancelled() => inner.dispatch(&tick),
        _ => return,
    }

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.dispatch(&tick);
            }
        }
    }
    debug!("Timer for device {} exited", tick.device_id);
}
