pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod producer;
pub mod scheduler;
pub mod sensor;

pub use error::{Result, SimError};
pub use logging::init_logger;
