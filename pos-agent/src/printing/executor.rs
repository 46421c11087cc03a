//! Job executor
//!
//! Runs print jobs against the printer session, one at a time, through the
//! [`JobSerializer`]. In test mode the rendered bytes are captured to a file
//! instead of being sent.

use super::command::{Command, Job};
use super::imaging::ImagePreprocessor;
use super::interpreter::CommandInterpreter;
use super::serializer::{JobSerializer, SerializerError};
use super::session::{DriverFactory, PrinterSession, SessionError};
use crate::core::config::AgentConfig;
use parking_lot::RwLock;
use pos_printer::{PrintError, PrinterDriver};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

/// `GS L 0 0`: left margin back to zero
const MARGIN_RESET: [u8; 4] = [0x1d, 0x4c, 0x00, 0x00];

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Printer initialization failed: {0}")]
    Init(#[from] SessionError),

    #[error("Printer Error: {0}")]
    Transmit(PrintError),

    #[error("Printer Error: no answer from printer after {0:?}")]
    Timeout(Duration),

    #[error("Printer busy: {0} jobs already queued")]
    Busy(usize),

    #[error("Failed to save simulated job: {0}")]
    Simulate(#[from] std::io::Error),

    #[error("Print queue is not available")]
    WorkerGone,
}

impl From<SerializerError> for JobError {
    fn from(err: SerializerError) -> Self {
        match err {
            SerializerError::Busy(queued) => JobError::Busy(queued),
            SerializerError::WorkerGone | SerializerError::Panicked(_) => JobError::WorkerGone,
        }
    }
}

/// How a job left the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Sent to the printer
    Transmitted { bytes: usize },
    /// Captured in test mode; `path` is where the bytes were saved
    Simulated {
        buffer: Vec<u8>,
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub test_mode: bool,
    /// Directory for temporary logo rasters
    pub work_dir: PathBuf,
    /// Where test mode saves the captured bytes
    pub simulate_output: PathBuf,
    pub execute_timeout: Option<Duration>,
    pub queue_capacity: Option<usize>,
}

impl ExecutorSettings {
    pub fn from_config(config: &AgentConfig, work_dir: &Path) -> Self {
        Self {
            test_mode: config.test_mode,
            work_dir: work_dir.to_path_buf(),
            simulate_output: work_dir.join(&config.simulate_output),
            execute_timeout: config.execute_timeout(),
            queue_capacity: config.queue_capacity,
        }
    }
}

type LastJob = Arc<RwLock<Option<Vec<Command>>>>;

/// Print job front door; clones share the queue and the Last Job slot
#[derive(Clone)]
pub struct JobExecutor {
    serializer: JobSerializer<PrinterSession>,
    interpreter: Arc<CommandInterpreter>,
    last_job: LastJob,
    settings: Arc<ExecutorSettings>,
    next_id: Arc<AtomicU64>,
}

impl JobExecutor {
    /// Start the executor; needs a Tokio runtime
    pub fn new(session: PrinterSession, settings: ExecutorSettings) -> Self {
        let interpreter = CommandInterpreter::new(ImagePreprocessor::new(&settings.work_dir));
        Self {
            serializer: JobSerializer::spawn(session, settings.queue_capacity),
            interpreter: Arc::new(interpreter),
            last_job: Arc::new(RwLock::new(None)),
            settings: Arc::new(settings),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &AgentConfig, work_dir: &Path, factory: DriverFactory) -> Self {
        let session = PrinterSession::new(&config.printer, config.test_mode, factory);
        Self::new(session, ExecutorSettings::from_config(config, work_dir))
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Jobs waiting or printing
    pub fn queued(&self) -> usize {
        self.serializer.queued()
    }

    /// Commands of the most recently attempted job
    pub fn last_job(&self) -> Option<Vec<Command>> {
        self.last_job.read().clone()
    }

    /// Print a request body (bare command array or `{commands: [...]}`)
    pub async fn submit(&self, payload: Value) -> Result<JobOutcome, JobError> {
        self.submit_job(Job::from_payload(payload)).await
    }

    pub async fn submit_job(&self, job: Job) -> Result<JobOutcome, JobError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let span = info_span!("job", job = id, commands = job.len());
        let interpreter = self.interpreter.clone();
        let last_job = self.last_job.clone();
        let settings = self.settings.clone();

        let result = self
            .serializer
            .submit(move |session: &mut PrinterSession| {
                Box::pin(
                    async move { run_job(session, &interpreter, &last_job, &settings, job).await }
                        .instrument(span),
                )
            })
            .await
            .map_err(JobError::from)
            .and_then(|outcome| outcome);

        if let Err(e) = &result {
            error!(job = id, error = %e, "Print job failed");
        }
        result
    }

    /// Pulse the cash drawer, queued like any other job
    pub async fn open_cash_drawer(&self) -> Result<JobOutcome, JobError> {
        let settings = self.settings.clone();
        self.serializer
            .submit(move |session: &mut PrinterSession| {
                Box::pin(async move {
                    let driver = session.get_or_create()?;
                    driver.clear();
                    driver.open_cash_drawer();

                    let result = if settings.test_mode {
                        info!("Cash drawer open simulated");
                        Ok(JobOutcome::Simulated {
                            buffer: driver.get_buffer(),
                            path: None,
                        })
                    } else {
                        let sent = transmit(driver, settings.execute_timeout).await;
                        if sent.is_ok() {
                            info!("Cash drawer open sent");
                        }
                        sent
                    };

                    driver.clear();
                    result
                })
            })
            .await
            .map_err(JobError::from)
            .and_then(|outcome| outcome)
    }
}

async fn run_job(
    session: &mut PrinterSession,
    interpreter: &CommandInterpreter,
    last_job: &LastJob,
    settings: &ExecutorSettings,
    job: Job,
) -> Result<JobOutcome, JobError> {
    let driver = session.get_or_create()?;

    driver.clear();
    driver.raw(&MARGIN_RESET);

    let mut commands = job.commands;
    *last_job.write() = Some(commands.clone());
    info!("Processing print job");

    for command in commands.iter_mut() {
        interpreter.apply(driver, command).await;
    }
    // Images now carry the raster that was actually printed
    *last_job.write() = Some(commands);

    let result = if settings.test_mode {
        simulate(driver, &settings.simulate_output).await
    } else {
        transmit(driver, settings.execute_timeout).await
    };

    driver.clear();
    result
}

async fn simulate(driver: &mut dyn PrinterDriver, path: &Path) -> Result<JobOutcome, JobError> {
    let buffer = driver.get_buffer();
    tokio::fs::write(path, &buffer).await?;
    info!(path = %path.display(), bytes = buffer.len(), "Simulated job saved");
    Ok(JobOutcome::Simulated {
        buffer,
        path: Some(path.to_path_buf()),
    })
}

async fn transmit(
    driver: &mut dyn PrinterDriver,
    timeout: Option<Duration>,
) -> Result<JobOutcome, JobError> {
    let bytes = driver.get_buffer().len();
    let sent = match timeout {
        Some(limit) => match tokio::time::timeout(limit, driver.execute()).await {
            Ok(sent) => sent,
            Err(_) => {
                warn!(timeout = ?limit, "Printer did not accept the job in time");
                return Err(JobError::Timeout(limit));
            }
        },
        None => driver.execute().await,
    };
    sent.map_err(JobError::Transmit)?;

    info!(bytes, "Print job sent");
    Ok(JobOutcome::Transmitted { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let init = JobError::from(SessionError::Init("Invalid config: Empty printer interface".into()));
        assert_eq!(
            init.to_string(),
            "Printer initialization failed: Invalid config: Empty printer interface"
        );

        let transmit = JobError::Transmit(PrintError::Connection("10.0.0.5:9100: refused".into()));
        assert_eq!(
            transmit.to_string(),
            "Printer Error: Connection failed: 10.0.0.5:9100: refused"
        );
    }

    #[test]
    fn test_serializer_errors_map() {
        assert!(matches!(JobError::from(SerializerError::Busy(4)), JobError::Busy(4)));
        assert!(matches!(
            JobError::from(SerializerError::Panicked("x".into())),
            JobError::WorkerGone
        ));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = AgentConfig::default();
        config.execute_timeout_ms = Some(2500);
        let settings = ExecutorSettings::from_config(&config, Path::new("/srv/pos"));
        assert!(settings.test_mode);
        assert_eq!(settings.simulate_output, Path::new("/srv/pos/last_job_simulado.bin"));
        assert_eq!(settings.execute_timeout, Some(Duration::from_millis(2500)));
    }
}
