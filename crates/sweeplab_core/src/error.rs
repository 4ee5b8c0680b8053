use std::fmt;
use std::io;

/// Errors raised while reading or building a [`crate::spec::ParameterSpec`].
///
/// These are "malformed input" errors: nothing gets expanded or run when one
/// of them is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecError {
    /// The same parameter name appears twice
    DuplicateName(String),
    /// A value could not be interpreted as a number or list of numbers
    InvalidValue { name: String, reason: String },
    /// The cartesian product is larger than the sweep limit (`None` when it
    /// doesn't even fit in a `usize`)
    TooManySeries { count: Option<usize>, limit: usize },
    /// The document itself failed to parse
    Parse(String),
    /// The parameter file could not be read
    Io(String),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::DuplicateName(name) => write!(f, "duplicate parameter '{name}'"),
            SpecError::InvalidValue { name, reason } => {
                write!(f, "invalid value for parameter '{name}': {reason}")
            }
            SpecError::TooManySeries { count: Some(count), limit } => {
                write!(f, "sweep has {count} series, the limit is {limit}")
            }
            SpecError::TooManySeries { count: None, limit } => {
                write!(f, "sweep has more series than the limit of {limit}")
            }
            SpecError::Parse(msg) => write!(f, "failed to parse parameters: {msg}"),
            SpecError::Io(msg) => write!(f, "failed to read parameters: {msg}"),
        }
    }
}

impl std::error::Error for SpecError {}

/// A required input is absent from a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingParameter {
    pub name: String,
    /// 1-based series index
    pub series: usize,
}

impl fmt::Display for MissingParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "series {}: missing parameter '{}'",
            self.series, self.name
        )
    }
}

impl std::error::Error for MissingParameter {}

/// Errors from the per-run log and results store.
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Csv(csv::Error),
    /// The row being appended doesn't have the store's columns
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    /// A cell in the store isn't a number
    InvalidCell { column: String, value: String },
    /// No run directory exists for this id
    RunNotFound(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Csv(e) => write!(f, "CSV error: {e}"),
            StoreError::HeaderMismatch { expected, found } => write!(
                f,
                "column mismatch: store has [{}], row has [{}]",
                expected.join(", "),
                found.join(", ")
            ),
            StoreError::InvalidCell { column, value } => {
                write!(f, "non-numeric value {value:?} in column '{column}'")
            }
            StoreError::RunNotFound(id) => write!(f, "run {id} not found"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        StoreError::Csv(err)
    }
}

/// Failures that escape the per-series boundary and terminate a run.
#[derive(Debug)]
pub enum RunError {
    Store(StoreError),
    /// The formula set panicked
    Panicked(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Store(e) => write!(f, "{e}"),
            RunError::Panicked(msg) => write!(f, "computation panicked: {msg}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Store(e) => Some(e),
            RunError::Panicked(_) => None,
        }
    }
}

impl From<StoreError> for RunError {
    fn from(err: StoreError) -> Self {
        RunError::Store(err)
    }
}

impl From<io::Error> for RunError {
    fn from(err: io::Error) -> Self {
        RunError::Store(StoreError::Io(err))
    }
}

/// Failures when a session expands and starts a sweep in one step.
#[derive(Debug)]
pub enum SessionError {
    Spec(SpecError),
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Spec(e) => write!(f, "{e}"),
            SessionError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Spec(e) => Some(e),
            SessionError::Store(e) => Some(e),
        }
    }
}

impl From<SpecError> for SessionError {
    fn from(err: SpecError) -> Self {
        SessionError::Spec(err)
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}
