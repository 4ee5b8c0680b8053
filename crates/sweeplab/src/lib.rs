//! Command-line front end for the sweep engine
//!
//! Runs parameter sweeps from YAML/JSON files, follows their logs and
//! exports the accumulated history.

pub mod commands;
pub mod config;
pub mod logging;

pub use config::{AppConfig, DataDirectory};
pub use logging::init_logging;
