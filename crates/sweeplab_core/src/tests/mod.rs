//! Integration tests for the sweep engine
//!
//! Tests are organized by topic:
//! - `sweep` - Series counts and enumeration order
//! - `runner` - Per-series logging, skipping and run termination
//! - `history` - Aggregation over several runs
//! - `end_to_end` - Parameter file through to results store

mod end_to_end;
mod history;

use std::sync::Arc;

use crate::formula::{EnergyFormulas, FormulaSet};
use crate::runner::{RunnerConfig, SeriesRunner};
use crate::store::RunsDirectory;
use crate::sweep::Series;

/// Runner with no artificial delays
pub(crate) fn instant_runner(runs: RunsDirectory, formulas: Arc<dyn FormulaSet>) -> SeriesRunner {
    SeriesRunner::new(runs, formulas, RunnerConfig::instant())
}

pub(crate) fn energy_runner(runs: RunsDirectory) -> SeriesRunner {
    instant_runner(runs, Arc::new(EnergyFormulas))
}

/// A complete input set for [`EnergyFormulas`]
pub(crate) fn energy_series(m: f64, g: f64, h: f64, v: f64, t: f64, specific_heat: f64) -> Series {
    Series::from_pairs([
        ("m", m),
        ("g", g),
        ("h", h),
        ("V", v),
        ("T", t),
        ("SPECIFIC_HEAT", specific_heat),
    ])
}

pub(crate) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
