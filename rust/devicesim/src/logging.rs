use log::{LevelFilter, Metadata, Record};
use std::sync::Once;

pub struct SimLogger {
    level: LevelFilter,
}

impl log::Log for SimLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!(
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static INIT: Once = Once::new();

/// Installs the stdout logger once per process. Later calls are no-ops, and a
/// logger installed elsewhere (e.g. `env_logger`) is left in place.
pub fn init_logger(level: LevelFilter) {
    INIT.call_once(|| {
        let logger = SimLogger { level };
        if log::set_boxed_logger(Box::new(logger)).is_ok() {
            log::set_max_level(level);
        }
    });
}
