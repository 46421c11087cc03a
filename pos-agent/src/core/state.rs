use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::AgentConfig;
use crate::printing::{DriverFactory, JobExecutor, thermal_factory};
use crate::utils::LogBuffer;

/// Shared state of the agent
///
/// | Field | Description |
/// |-------|-------------|
/// | config | live configuration, updated by `POST /api/config` |
/// | executor | print queue (printer settings are fixed at startup) |
/// | logs | recent log lines |
/// | work_dir | config.json, logs, certificates, simulated output |
/// | shutdown | cancelled to stop the server |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<RwLock<AgentConfig>>,
    pub executor: JobExecutor,
    pub logs: LogBuffer,
    pub work_dir: Arc<PathBuf>,
    pub shutdown: CancellationToken,
}

impl ServerState {
    /// State with the real thermal printer driver
    ///
    /// Must be called inside a Tokio runtime.
    pub fn initialize(config: AgentConfig, work_dir: PathBuf, logs: LogBuffer) -> Self {
        Self::with_factory(config, work_dir, logs, thermal_factory())
    }

    /// State with a custom driver factory
    pub fn with_factory(
        config: AgentConfig,
        work_dir: PathBuf,
        logs: LogBuffer,
        factory: DriverFactory,
    ) -> Self {
        let executor = JobExecutor::from_config(&config, &work_dir, factory);
        Self {
            config: Arc::new(RwLock::new(config)),
            executor,
            logs,
            work_dir: Arc::new(work_dir),
            shutdown: CancellationToken::new(),
        }
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> AgentConfig {
        self.config.read().clone()
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}
