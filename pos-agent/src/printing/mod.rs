//! Print job execution
//!
//! # Structure
//!
//! - [`command`] - JSON job model
//! - [`imaging`] - logo normalisation
//! - [`interpreter`] - command to driver calls
//! - [`session`] - the lazily built printer driver
//! - [`serializer`] - one-at-a-time FIFO execution
//! - [`executor`] - orchestration, simulate mode and Last Job

pub mod command;
pub mod executor;
pub mod imaging;
pub mod interpreter;
pub mod serializer;
pub mod session;

pub use command::{Alignment, Command, Job};
pub use executor::{ExecutorSettings, JobError, JobExecutor, JobOutcome};
pub use imaging::{ImagePreprocessor, PreprocessError, ProcessedImage};
pub use interpreter::CommandInterpreter;
pub use serializer::{JobSerializer, SerializerError};
pub use session::{DriverFactory, LOOPBACK_INTERFACE, PrinterSession, SessionError, thermal_factory};
