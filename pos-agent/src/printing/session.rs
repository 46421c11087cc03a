//! Printer session
//!
//! Owns the one driver handle of the process. The driver is built on first
//! use; a configuration error is remembered and returned on every later use,
//! while a transient error (printer unreachable) is retried next time.

use crate::core::config::PrinterConfig;
use pos_printer::{PrintResult, PrinterDriver, PrinterSettings, ThermalPrinter};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Interface used in test mode, whatever is configured
pub const LOOPBACK_INTERFACE: &str = "tcp://0.0.0.0";

/// Builds a driver for the given settings
pub type DriverFactory =
    Arc<dyn Fn(&PrinterSettings) -> PrintResult<Box<dyn PrinterDriver>> + Send + Sync>;

/// Factory for real thermal printers
pub fn thermal_factory() -> DriverFactory {
    Arc::new(|settings: &PrinterSettings| {
        let printer = ThermalPrinter::new(settings)?;
        Ok(Box::new(printer) as Box<dyn PrinterDriver>)
    })
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("{0}")]
    Init(String),
}

pub struct PrinterSession {
    settings: PrinterSettings,
    test_mode: bool,
    factory: DriverFactory,
    driver: Option<Box<dyn PrinterDriver>>,
    /// Cached configuration-fatal construction error
    failure: Option<SessionError>,
}

impl PrinterSession {
    pub fn new(config: &PrinterConfig, test_mode: bool, factory: DriverFactory) -> Self {
        let mut settings = config.settings();
        if test_mode {
            settings.interface = LOOPBACK_INTERFACE.to_string();
        }
        Self {
            settings,
            test_mode,
            factory,
            driver: None,
            failure: None,
        }
    }

    pub fn settings(&self) -> &PrinterSettings {
        &self.settings
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    /// The driver, constructing it if needed
    pub fn get_or_create(&mut self) -> Result<&mut dyn PrinterDriver, SessionError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        if self.driver.is_none() {
            info!(
                printer_type = ?self.settings.printer_type,
                interface = %self.settings.interface,
                width = self.settings.width,
                "Initializing printer driver"
            );
            match (self.factory)(&self.settings) {
                Ok(driver) => self.driver = Some(driver),
                Err(e) => {
                    error!(error = %e, "Failed to initialize printer driver");
                    let failure = SessionError::Init(e.to_string());
                    if !e.is_transient() {
                        self.failure = Some(failure.clone());
                    }
                    return Err(failure);
                }
            }
        }

        match self.driver.as_mut() {
            Some(driver) => Ok(driver.as_mut()),
            None => Err(SessionError::Init("printer driver unavailable".into())),
        }
    }
}

impl std::fmt::Debug for PrinterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrinterSession")
            .field("settings", &self.settings)
            .field("test_mode", &self.test_mode)
            .field("initialized", &self.driver.is_some())
            .field("failure", &self.failure)
            .finish()
    }
}
