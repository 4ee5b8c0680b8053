//! Formula sets computed for each series.
//!
//! The runner only relies on the [`FormulaSet`] contract: a fixed list of
//! required inputs and a function from those inputs to labelled outputs.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A computed value
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// Column name in the results store
    pub column: &'static str,
    /// Label written to the run log
    pub label: &'static str,
    pub value: f64,
}

impl Output {
    fn new(column: &'static str, label: &'static str, value: f64) -> Self {
        Self {
            column,
            label,
            value,
        }
    }
}

pub trait FormulaSet: Send + Sync {
    fn name(&self) -> &'static str;

    /// Required input names, in result-column order
    fn inputs(&self) -> &'static [&'static str];

    /// Output column names, in the order `evaluate` returns them
    fn outputs(&self) -> &'static [&'static str];

    /// Compute outputs from input values given in [`FormulaSet::inputs`] order.
    fn evaluate(&self, inputs: &[f64]) -> Vec<Output>;
}

/// Reference temperature for the heat formula
pub const REFERENCE_TEMPERATURE: f64 = 20.0;

/// Potential, kinetic, total and heat energy.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyFormulas;

impl FormulaSet for EnergyFormulas {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn inputs(&self) -> &'static [&'static str] {
        &["m", "g", "h", "V", "T", "SPECIFIC_HEAT"]
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["E_pot", "E_kin", "E_total", "Q"]
    }

    fn evaluate(&self, inputs: &[f64]) -> Vec<Output> {
        let [m, g, h, v, t, specific_heat] = inputs else {
            panic!("energy formulas take 6 inputs, got {}", inputs.len());
        };

        let e_pot = m * g * h;
        let e_kin = 0.5 * m * v.powi(2);
        let e_total = e_pot + e_kin;
        let q = m * specific_heat * (t - REFERENCE_TEMPERATURE);

        vec![
            Output::new("E_pot", "E_pot (potential)", e_pot),
            Output::new("E_kin", "E_kin (kinetic)", e_kin),
            Output::new("E_total", "E_total (total)", e_total),
            Output::new("Q", "E_heat (heat)", q),
        ]
    }
}

/// Stand-in results: three integers drawn uniformly from `1..=10`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPlaceholder;

impl FormulaSet for RandomPlaceholder {
    fn name(&self) -> &'static str {
        "random"
    }

    fn inputs(&self) -> &'static [&'static str] {
        &["A1", "B1"]
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["RES1", "RES2", "RES3"]
    }

    fn evaluate(&self, _inputs: &[f64]) -> Vec<Output> {
        let mut rng = rand::rng();
        vec![
            Output::new("RES1", "RES1", rng.random_range(1..=10) as f64),
            Output::new("RES2", "RES2", rng.random_range(1..=10) as f64),
            Output::new("RES3", "RES3", rng.random_range(1..=10) as f64),
        ]
    }
}

/// Named formula sets selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulaKind {
    #[default]
    Energy,
    Random,
}

impl FormulaKind {
    pub fn build(self) -> Arc<dyn FormulaSet> {
        match self {
            FormulaKind::Energy => Arc::new(EnergyFormulas),
            FormulaKind::Random => Arc::new(RandomPlaceholder),
        }
    }
}

impl fmt::Display for FormulaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaKind::Energy => write!(f, "energy"),
            FormulaKind::Random => write!(f, "random"),
        }
    }
}

impl std::str::FromStr for FormulaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "energy" => Ok(FormulaKind::Energy),
            "random" => Ok(FormulaKind::Random),
            other => Err(format!("unknown formula set '{other}' (expected energy or random)")),
        }
    }
}
