//! Library entry point for tasklog-cli components.
//!
//! Exposes configuration, error and rendering helpers so tests can exercise
//! them without going through the binary entry point.

pub mod config;
pub mod error;
pub mod output;

pub use config::{apply_overrides, build_client, load_config, Overrides};
pub use error::{CliError, Result};
pub use output::TerminalRedirect;
