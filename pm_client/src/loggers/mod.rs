//! # Logging
//!
//! `fern` dispatch for the binaries: colored console output plus one
//! timestamped file per run.

/// Logger installation and log file cleanup.
pub mod setup;

pub use setup::{parse_level, setup_logging, LoggerError};
