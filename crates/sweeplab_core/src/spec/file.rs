//! Parameter documents as uploaded by users.
//!
//! Two shapes are accepted:
//!
//! ```yaml
//! # flat: name -> scalar | list
//! m: [1, 2]
//! g: 9.8
//! ```
//!
//! ```yaml
//! # structured: adjustable parameters plus read-only constants
//! parameters:
//!   m: { name: Mass, unit: kg, min: 1, max: 3, step: 1, sweep: true }
//!   h: { name: Height, unit: m, default: 2 }
//! constants:
//!   g: { name: Gravity, value: 9.8 }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ParamValue, ParameterSpec, deserialize_ordered};
use crate::error::SpecError;

/// Upper bound on the number of points a single range may generate
const MAX_RANGE_POINTS: usize = 100_000;

/// An adjustable parameter in a structured document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
    /// Explicit candidate values; takes precedence over the range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    /// Sweep the whole `min..=max` range instead of using the default
    #[serde(default)]
    pub sweep: bool,
}

impl ParameterDef {
    /// The value used when the parameter isn't swept.
    pub fn default_value(&self) -> f64 {
        self.default.or(self.min).unwrap_or(0.0)
    }

    /// Inclusive `min..=max` range stepped by `step` (1 when unset).
    pub fn range_values(&self, key: &str) -> Result<Vec<f64>, SpecError> {
        let invalid = |reason: &str| SpecError::InvalidValue {
            name: key.to_string(),
            reason: reason.to_string(),
        };

        let min = self.min.ok_or_else(|| invalid("sweep requires 'min'"))?;
        let max = self.max.ok_or_else(|| invalid("sweep requires 'max'"))?;
        let step = self.step.unwrap_or(1.0);

        if !min.is_finite() || !max.is_finite() {
            return Err(invalid("min and max must be finite numbers"));
        }
        if step <= 0.0 || !step.is_finite() {
            return Err(invalid("step must be a positive number"));
        }
        if max < min {
            return Err(invalid("max is smaller than min"));
        }

        // Small epsilon so that e.g. 0.1..=0.3 step 0.1 includes 0.3
        let steps = ((max - min) / step + 1e-9).floor();
        if !steps.is_finite() || steps >= MAX_RANGE_POINTS as f64 {
            return Err(invalid("range produces too many points"));
        }
        let count = steps as usize + 1;

        Ok((0..count).map(|i| min + step * i as f64).collect())
    }

    fn to_value(&self, key: &str) -> Result<ParamValue, SpecError> {
        if let Some(values) = &self.values {
            return Ok(ParamValue::List(values.clone()));
        }
        if self.sweep {
            return Ok(ParamValue::List(self.range_values(key)?));
        }
        Ok(ParamValue::Scalar(self.default_value()))
    }
}

/// A fixed, read-only value in a structured document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StructuredDoc {
    #[serde(default, deserialize_with = "deserialize_ordered")]
    parameters: Vec<(String, ParameterDef)>,
    #[serde(default, deserialize_with = "deserialize_ordered")]
    constants: Vec<(String, ConstantDef)>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RawFile {
    Structured(StructuredDoc),
    Flat(ParameterSpec),
}

/// A parsed parameter document
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterFile {
    Flat(ParameterSpec),
    Structured {
        parameters: Vec<(String, ParameterDef)>,
        constants: Vec<(String, ConstantDef)>,
    },
}

/// Counts reported back after a document is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    /// Adjustable parameters (flat documents count every entry here)
    pub parameters: usize,
    pub constants: usize,
}

impl FileSummary {
    pub fn total(&self) -> usize {
        self.parameters + self.constants
    }
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} parameters ({} adjustable, {} constants)",
            self.total(),
            self.parameters,
            self.constants
        )
    }
}

impl From<RawFile> for ParameterFile {
    fn from(raw: RawFile) -> Self {
        match raw {
            RawFile::Flat(spec) => ParameterFile::Flat(spec),
            RawFile::Structured(doc) => ParameterFile::Structured {
                parameters: doc.parameters,
                constants: doc.constants,
            },
        }
    }
}

impl ParameterFile {
    pub fn from_yaml(content: &str) -> Result<Self, SpecError> {
        serde_saphyr::from_str::<RawFile>(content)
            .map(Into::into)
            .map_err(|e| SpecError::Parse(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, SpecError> {
        serde_json::from_str::<RawFile>(content)
            .map(Into::into)
            .map_err(|e| SpecError::Parse(e.to_string()))
    }

    /// Parse document text, picking the format from its first character.
    ///
    /// JSON documents are objects, so anything starting with `{` is tried as
    /// JSON first; YAML is the fallback (it is a superset of JSON anyway).
    pub fn parse(content: &str) -> Result<Self, SpecError> {
        if content.trim_start().starts_with('{')
            && let Ok(file) = Self::from_json(content)
        {
            return Ok(file);
        }
        Self::from_yaml(content)
    }

    /// Load a document from disk. `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn load(path: &Path) -> Result<Self, SpecError> {
        let content = fs::read_to_string(path)
            .map_err(|e| SpecError::Io(format!("{}: {e}", path.display())))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn summary(&self) -> FileSummary {
        match self {
            ParameterFile::Flat(spec) => FileSummary {
                parameters: spec.len(),
                constants: 0,
            },
            ParameterFile::Structured {
                parameters,
                constants,
            } => FileSummary {
                parameters: parameters.len(),
                constants: constants.len(),
            },
        }
    }

    /// Resolve the document into a [`ParameterSpec`]. Parameters come first,
    /// then constants, each in document order.
    pub fn to_spec(&self) -> Result<ParameterSpec, SpecError> {
        match self {
            ParameterFile::Flat(spec) => Ok(spec.clone()),
            ParameterFile::Structured {
                parameters,
                constants,
            } => {
                let mut spec = ParameterSpec::new();
                for (key, def) in parameters {
                    spec.insert(key.clone(), def.to_value(key)?)?;
                }
                for (key, def) in constants {
                    spec.insert(key.clone(), def.value)?;
                }
                Ok(spec)
            }
        }
    }
}
