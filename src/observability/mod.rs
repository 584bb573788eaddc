//! Observability module
//!
//! This module provides:
//! - Console logging to stderr, text or JSON
//! - An optional append-only log file mirroring the console

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
