//! Logging Infrastructure
//!
//! - Console output
//! - Daily rotating log files in `<work_dir>/logs` (deleted after 14 days)
//! - An in-memory ring of recent entries, served by `GET /api/logs`
//! - Panics appended to `crash.log`

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::Context;
use tracing_subscriber::{EnvFilter, Layer, fmt as fmt_layer, prelude::*};

/// Entries kept for `GET /api/logs`
pub const LOG_BUFFER_CAPACITY: usize = 500;

/// Rolling file name prefix
const LOG_PREFIX: &str = "pos-agent";

const LOG_RETENTION_DAYS: i64 = 14;

const CRASH_LOG: &str = "crash.log";

/// Ring buffer of formatted log lines
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, entry: String) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(LOG_BUFFER_CAPACITY)
    }
}

/// Collects an event's message and fields into one line
#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: Vec<String>,
}

impl EntryVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogBuffer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        self.push(format!(
            "[{}] [{}] {}",
            timestamp,
            event.metadata().level(),
            visitor.finish()
        ));
    }
}

/// Initialize the logging system
///
/// `RUST_LOG` overrides `level`. With a `log_dir`, a daily rotating file is
/// written there and old files are cleaned up in the background (requires a
/// Tokio runtime).
pub fn init_logger(level: &str, log_dir: Option<&Path>, buffer: LogBuffer) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt_layer::layer().with_target(true).with_line_number(false);

    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_PREFIX)
                .filename_suffix("log")
                .build(dir)?;

            tokio::spawn(periodic_cleanup(dir.to_path_buf()));

            Some(
                fmt_layer::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(appender)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .with(buffer)
        .try_init()?;

    Ok(())
}

/// Delete rolled log files older than `days`
///
/// Only files named `pos-agent.YYYY-MM-DD.log` are considered.
pub fn cleanup_old_logs(log_dir: &Path, days: i64) -> anyhow::Result<usize> {
    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(days);
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let date = name
            .strip_prefix(LOG_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|rest| rest.strip_suffix(".log"))
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        if let Some(date) = date
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }

    Ok(removed)
}

/// Runs the cleanup now and then every hour
async fn periodic_cleanup(log_dir: PathBuf) {
    use tokio::time::{Duration, sleep};

    loop {
        if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS) {
            tracing::error!(error = %e, "Failed to cleanup old logs");
        }
        sleep(Duration::from_secs(3600)).await;
    }
}

/// Log panics and append them to `<work_dir>/crash.log`
///
/// The previous hook still runs afterwards.
pub fn install_panic_hook(work_dir: &Path) {
    let crash_log = work_dir.join(CRASH_LOG);
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "CRASH DETECTED. Check crash.log");

        let entry = format!("[{}] [PANIC] {}\n", chrono::Utc::now().to_rfc3339(), info);
        let written = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&crash_log)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if let Err(e) = written {
            eprintln!("Failed to write to crash log: {}", e);
        }

        previous(info);
    }));
}
