//! Agent configuration
//!
//! Loaded from `<work_dir>/config.json`; every field missing from the file
//! keeps its default. Nested `printer` fields merge one by one.
//!
//! # Environment variables
//!
//! Applied after the file (a `.env` file is honoured via `dotenv`):
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | WORK_DIR | directory holding config.json, logs and certificates |
//! | HTTP_PORT | `port` |
//! | TEST_MODE | `test_mode` |
//! | PRINTER_INTERFACE | `printer.interface` |
//! | LOG_LEVEL | `log_level` |

use pos_printer::{CharacterSet, PrinterSettings, PrinterType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

/// Printer section of the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// `epson` or `star`
    #[serde(rename = "type")]
    pub printer_type: String,
    /// `tcp://host[:port]`, `printer:NAME` or a device path
    pub interface: String,
    /// Characters per line
    pub width: usize,
    #[serde(rename = "characterSet")]
    pub character_set: String,
    pub options: PrinterOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterOptions {
    /// Connection timeout in milliseconds
    pub timeout: u64,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        Self { timeout: 5000 }
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            printer_type: "epson".into(),
            interface: "printer:POS-58".into(),
            width: 48,
            character_set: "PC852_LATIN2".into(),
            options: PrinterOptions::default(),
        }
    }
}

impl PrinterConfig {
    /// Driver settings for this section
    ///
    /// Unknown printer types fall back to Epson and unknown character sets
    /// to PC437; only the interface can make a driver unusable.
    pub fn settings(&self) -> PrinterSettings {
        let printer_type = PrinterType::parse(&self.printer_type).unwrap_or_else(|| {
            tracing::warn!(printer_type = %self.printer_type, "Unknown printer type, using epson");
            PrinterType::Epson
        });
        let character_set = CharacterSet::parse(&self.character_set).unwrap_or_else(|| {
            tracing::warn!(charset = %self.character_set, "Unknown character set, using PC437_USA");
            CharacterSet::default()
        });

        PrinterSettings {
            printer_type,
            interface: self.interface.clone(),
            width: if self.width == 0 { 32 } else { self.width },
            character_set,
            timeout: Duration::from_millis(self.options.timeout),
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// HTTP(S) port
    pub port: u16,
    /// Capture jobs to a file instead of sending them
    pub test_mode: bool,
    /// CORS origins; empty allows every origin
    pub allowed_origins: Vec<String>,
    pub printer: PrinterConfig,
    /// Abort a transmission that takes longer than this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute_timeout_ms: Option<u64>,
    /// Reject new jobs with 503 once this many are outstanding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    /// Simulated output file, relative to the work dir
    pub simulate_output: String,
    pub log_level: String,
    /// Keys this version does not know about, kept so saving never drops them
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            test_mode: true,
            allowed_origins: Vec::new(),
            printer: PrinterConfig::default(),
            execute_timeout_ms: None,
            queue_capacity: None,
            simulate_output: "last_job_simulado.bin".into(),
            log_level: "info".into(),
            extra: Map::new(),
        }
    }
}

impl AgentConfig {
    /// Load `config.json` from the work dir, then apply environment overrides
    ///
    /// A missing file means defaults; a malformed one is logged and ignored.
    pub fn load(work_dir: &Path) -> Self {
        let mut config = Self::read_file(&work_dir.join(CONFIG_FILE));
        config.apply_env();
        config
    }

    fn read_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config.json found, using defaults");
                return Self::default();
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read config.json, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str::<AgentConfig>(&content) {
            Ok(mut config) => {
                config.normalize();
                tracing::info!(path = %path.display(), "Loaded external configuration");
                config
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Error parsing config.json, using defaults");
                Self::default()
            }
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Some(port) = std::env::var("HTTP_PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(test_mode) = std::env::var("TEST_MODE").ok().and_then(|v| v.parse().ok()) {
            self.test_mode = test_mode;
        }
        if let Ok(interface) = std::env::var("PRINTER_INTERFACE") {
            self.printer.interface = interface;
            self.normalize();
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Apply a partial JSON update, returning the merged configuration
    ///
    /// Objects merge key by key; any other value replaces the current one.
    pub fn merge_json(&self, patch: &Value) -> Result<Self, serde_json::Error> {
        let mut current = serde_json::to_value(self)?;
        merge_value(&mut current, patch);
        let mut merged: AgentConfig = serde_json::from_value(current)?;
        merged.normalize();
        Ok(merged)
    }

    /// Write the configuration to `<work_dir>/config.json`
    pub async fn save(&self, work_dir: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(work_dir.join(CONFIG_FILE), json).await?;
        Ok(())
    }

    /// Execute timeout, if configured
    pub fn execute_timeout(&self) -> Option<Duration> {
        self.execute_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Windows shares typed with forward slashes become `\\host\share`
    fn normalize(&mut self) {
        let iface = &self.printer.interface;
        if iface.starts_with("//") || iface.starts_with("\\\\") {
            self.printer.interface = iface.replace('/', "\\");
        }
    }
}

fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Directory holding config.json, logs, certificates and simulated output
///
/// `WORK_DIR` if set, otherwise the directory of the executable.
pub fn resolve_work_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WORK_DIR") {
        return PathBuf::from(dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
