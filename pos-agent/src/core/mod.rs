//! Core module - configuration, state and errors
//!
//! - [`AgentConfig`] - agent configuration
//! - [`ServerState`] - shared state
//! - [`Server`] - HTTP(S) server
//! - [`ServerError`] - handler errors

pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub use config::{AgentConfig, PrinterConfig, resolve_work_dir};
pub use error::{Result, ServerError, StatusResponse};
pub use server::Server;
pub use state::ServerState;
