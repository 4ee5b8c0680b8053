//! Parameter sweep engine
//!
//! This crate turns a set of named parameters into the cartesian product of
//! its candidate values and runs every combination ("series") in the
//! background, one at a time. It provides:
//! - Parameter specs, loadable from flat or structured YAML/JSON documents
//! - Deterministic sweep expansion (last parameter varies fastest)
//! - Swappable formula sets evaluated per series
//! - Per-run storage: an append-only log and an atomically replaced results CSV
//! - Progress polling derived from the log's terminal marker
//! - A history view merging every run's results
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sweeplab_core::{EnergyFormulas, ParameterSpec, RunnerConfig, RunsDirectory, SeriesRunner};
//!
//! let spec = ParameterSpec::from_yaml("m: [1, 2]\ng: 9.8\nh: [1, 2]\nV: 3\nT: 25\nSPECIFIC_HEAT: 1\n")?;
//! let runner = SeriesRunner::new(
//!     RunsDirectory::new("runs"),
//!     Arc::new(EnergyFormulas),
//!     RunnerConfig::default(),
//! );
//! let handle = runner.start(sweeplab_core::sweep::expand(&spec)?.into_series())?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod error;
pub mod formula;
pub mod history;
pub mod io;
pub mod runner;
pub mod session;
pub mod store;
pub mod sweep;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod spec;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use error::{MissingParameter, RunError, SessionError, SpecError, StoreError};
pub use formula::{EnergyFormulas, FormulaKind, FormulaSet, Output, RandomPlaceholder};
pub use history::{HistoryRow, HistoryView, load_history};
pub use runner::{RunHandle, RunState, RunSummary, RunnerConfig, SeriesRunner};
pub use session::{LoadedParameters, Started, SweepSession};
pub use spec::{ParamValue, ParameterFile, ParameterSpec};
pub use store::{ResultRow, ResultsTable, RunFiles, RunId, RunProgress, RunsDirectory};
pub use sweep::{MAX_SERIES, Series, Sweep, expand};
