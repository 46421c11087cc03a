//! POS Agent - local print agent for point-of-sale web apps
//!
//! Receives print jobs over HTTP(S) as JSON command lists and renders them
//! on a thermal printer (ESC/POS or Star), one job at a time.
//!
//! ```text
//! pos-agent/src/
//! ├── core/          # config, state, errors, server
//! ├── printing/      # commands, interpreter, serializer, executor
//! ├── api/           # HTTP routes
//! └── utils/         # logging
//! ```

pub mod api;
pub mod core;
pub mod printing;
pub mod utils;

use std::path::PathBuf;

pub use core::{AgentConfig, PrinterConfig, Server, ServerError, ServerState};
pub use printing::{Command, Job, JobError, JobExecutor, JobOutcome};
pub use utils::LogBuffer;

/// Everything `main` needs before the server starts
pub struct Environment {
    pub config: AgentConfig,
    pub work_dir: PathBuf,
    pub logs: LogBuffer,
}

/// Load `.env` and the config file, then start logging
pub fn setup_environment() -> anyhow::Result<Environment> {
    dotenv::dotenv().ok();

    let work_dir = core::resolve_work_dir();
    let config = AgentConfig::load(&work_dir);

    let logs = LogBuffer::default();
    let log_dir = work_dir.join("logs");
    utils::init_logger(&config.log_level, Some(log_dir.as_path()), logs.clone())?;
    utils::install_panic_hook(&work_dir);

    Ok(Environment {
        config,
        work_dir,
        logs,
    })
}
