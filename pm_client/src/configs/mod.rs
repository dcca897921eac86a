//! # Configuration
//!
//! Layered client configuration for the console binaries: built-in defaults,
//! then an optional JSON file, then environment variables and command-line
//! flags.

/// The `ClientConfig` struct, its layering and resolved accessors.
pub mod client_config;

pub use client_config::{default_config_path, ClientConfig, ConfigError};
