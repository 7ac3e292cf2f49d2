use devicesim::config::SimulatorConfig;
use devicesim::device::{
    DeviceDispatcher, DeviceStore, MemoryDeviceStore, MemoryHistory, StaticSettings,
};
use devicesim::orchestrator::Orchestrator;
use devicesim::scheduler::AutoSendScheduler;
use log::{error, info, warn};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const STATUS_EVERY: Duration = Duration::from_secs(30);

async fn report_status(
    scheduler: AutoSendScheduler,
    devices: Arc<MemoryDeviceStore>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(STATUS_EVERY);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                for device in devices.devices().await {
                    let status = scheduler.status(&device.id).await;
                    info!(
                        "Device {} ({}): enabled={} last_sent_at={:?} sending={:?}",
                        device.id, device.category, status.enabled, status.last_sent_at, status.is_sending
                    );
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::init();

    let config = SimulatorConfig::load()?;
    info!(
        "Loaded {} device(s), history limit {}",
        config.devices.len(),
        config.history_limit
    );
    if config.connection.is_none() {
        warn!("No connection configured; sends will fail until one is set");
    }

    let devices = Arc::new(MemoryDeviceStore::with_devices(
        config.devices.iter().map(|device| device.to_device()),
    ));
    let history = Arc::new(MemoryHistory::new(config.history_limit));
    let settings = Arc::new(StaticSettings::new(config.connection.clone()));
    let orchestrator = Orchestrator::new(config.request_timeout())?;

    let dispatcher = Arc::new(DeviceDispatcher::new(
        devices.clone(),
        history,
        settings,
        orchestrator,
    ));
    let scheduler = AutoSendScheduler::new(dispatcher);

    for device in config.devices.iter().filter(|device| device.auto_start) {
        if let Err(e) = scheduler
            .start(&device.id, device.interval(), device.use_variance)
            .await
        {
            error!("Failed to start auto-send for device {}: {}", device.id, e);
        }
    }

    let cancel = CancellationToken::new();
    let reporter = tokio::spawn(report_status(
        scheduler.clone(),
        devices.clone(),
        cancel.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    cancel.cancel();
    scheduler.shutdown().await;
    if let Err(e) = reporter.await {
        error!("Status reporter ended abnormally: {}", e);
    }

    info!("Simulator shut down successfully");
    Ok(())
}
