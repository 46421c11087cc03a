//! Utility modules

pub mod logger;

pub use logger::{LogBuffer, cleanup_old_logs, init_logger, install_panic_hook};
