//! Background execution of a sweep.
//!
//! Each call to [`SeriesRunner::start`] creates one run and one thread. The
//! thread works through the series strictly in order, logging every step and
//! appending a result row per successful series. Callers poll the run log
//! (see [`RunsDirectory::progress`](crate::store::RunsDirectory::progress)) or
//! the returned [`RunHandle`].
//!
//! Runs can't be cancelled; once started they go to completion.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;

use crate::error::{MissingParameter, RunError, StoreError};
use crate::formula::{FormulaSet, Output};
use crate::store::{ResultRow, RunFiles, RunId, RunsDirectory};
use crate::sweep::Series;

/// Last log line of a run that went through every series
pub const COMPLETE_MARKER: &str = "ALL SERIES COMPLETE";
/// Prefix of the last log line of a run that hit a run-level error
pub const FAILED_PREFIX: &str = "RUN FAILED:";

/// Attempts at writing a run's terminal log line
const TERMINAL_WRITE_ATTEMPTS: u32 = 3;
const TERMINAL_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Whether a log ends a run (either marker present).
pub fn log_is_terminal(log: &str) -> bool {
    log.lines()
        .any(|line| line == COMPLETE_MARKER || line.starts_with(FAILED_PREFIX))
}

/// Results store header for a formula set: `series`, its inputs, then its
/// outputs.
pub fn result_columns(formulas: &dyn FormulaSet) -> Vec<String> {
    std::iter::once("series")
        .chain(formulas.inputs().iter().copied())
        .chain(formulas.outputs().iter().copied())
        .map(str::to_string)
        .collect()
}

/// Delays between steps, simulating long computations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Pause after each logged output value
    pub step_delay: Duration,
    /// Pause between two series
    pub series_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(400),
            series_delay: Duration::from_millis(100),
        }
    }
}

impl RunnerConfig {
    /// No artificial delays
    pub fn instant() -> Self {
        Self {
            step_delay: Duration::ZERO,
            series_delay: Duration::ZERO,
        }
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Complete,
    Failed,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunState::Complete,
            2 => RunState::Failed,
            _ => RunState::Running,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RunState::Running => 0,
            RunState::Complete => 1,
            RunState::Failed => 2,
        }
    }

    pub fn is_finished(self) -> bool {
        self != RunState::Running
    }
}

/// Counts for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Handle to a run started in the background.
///
/// Dropping the handle detaches the thread; the run keeps going.
#[derive(Debug)]
pub struct RunHandle {
    id: RunId,
    total: usize,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<RunSummary>>,
}

impl RunHandle {
    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Number of series in the run
    pub fn total(&self) -> usize {
        self.total
    }

    /// Written once, after the terminal log line.
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Block until the run ends.
    pub fn join(self) -> RunSummary {
        self.wait().1
    }

    /// Block until the run ends and return its final state with the counts.
    pub fn wait(mut self) -> (RunState, RunSummary) {
        let Some(thread) = self.thread.take() else {
            return (self.state(), RunSummary::default());
        };
        match thread.join() {
            Ok(summary) => (self.state(), summary),
            Err(_) => (
                RunState::Failed,
                RunSummary {
                    total: self.total,
                    ..Default::default()
                },
            ),
        }
    }
}

/// Starts runs under a runs directory with a given formula set
#[derive(Clone)]
pub struct SeriesRunner {
    runs: RunsDirectory,
    formulas: Arc<dyn FormulaSet>,
    config: RunnerConfig,
}

impl SeriesRunner {
    pub fn new(runs: RunsDirectory, formulas: Arc<dyn FormulaSet>, config: RunnerConfig) -> Self {
        Self {
            runs,
            formulas,
            config,
        }
    }

    pub fn runs(&self) -> &RunsDirectory {
        &self.runs
    }

    pub fn formulas(&self) -> &dyn FormulaSet {
        self.formulas.as_ref()
    }

    /// Create a run and execute `series` on a background thread.
    ///
    /// An empty sweep is a no-op: no run is created and `Ok(None)` is returned.
    pub fn start(&self, series: Vec<Series>) -> Result<Option<RunHandle>, StoreError> {
        if series.is_empty() {
            tracing::info!("Empty sweep, nothing to run");
            return Ok(None);
        }

        let files = self.runs.create_run()?;
        files.append_log(&format!("Total series: {}", series.len()))?;

        let id = files.id().clone();
        let total = series.len();
        let state = Arc::new(AtomicU8::new(RunState::Running.as_u8()));

        let ctx = RunContext {
            columns: result_columns(self.formulas.as_ref()),
            files,
            formulas: self.formulas.clone(),
            config: self.config,
            state: state.clone(),
        };

        tracing::info!(run_id = %id, series = total, formulas = self.formulas.name(), "Starting sweep");

        let thread = thread::Builder::new()
            .name(format!("sweep-{id}"))
            .spawn(move || ctx.execute(&series))?;

        Ok(Some(RunHandle {
            id,
            total,
            state,
            thread: Some(thread),
        }))
    }
}

enum SeriesOutcome {
    Persisted,
    Skipped,
}

/// State owned by the background thread of one run
struct RunContext {
    files: RunFiles,
    /// Header of every row this run appends
    columns: Vec<String>,
    formulas: Arc<dyn FormulaSet>,
    config: RunnerConfig,
    state: Arc<AtomicU8>,
}

impl RunContext {
    fn execute(&self, series: &[Series]) -> RunSummary {
        let mut summary = RunSummary {
            total: series.len(),
            ..Default::default()
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_all(series, &mut summary)))
            .unwrap_or_else(|payload| Err(RunError::Panicked(panic_message(payload.as_ref()))));

        let result = result.and_then(|()| {
            self.append_terminal(COMPLETE_MARKER)
                .map_err(RunError::from)
        });

        let final_state = match result {
            Ok(()) => {
                tracing::info!(
                    run_id = %self.files.id(),
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Sweep complete"
                );
                RunState::Complete
            }
            Err(e) => {
                tracing::error!(run_id = %self.files.id(), error = %e, "Sweep failed");
                if let Err(log_err) = self.append_terminal(&format!("{FAILED_PREFIX} {e}")) {
                    tracing::error!(
                        run_id = %self.files.id(),
                        error = %log_err,
                        "Failed to write failure marker, only the run state records the end"
                    );
                }
                RunState::Failed
            }
        };

        self.state.store(final_state.as_u8(), Ordering::Release);
        summary
    }

    /// Append a marker line, retrying a few times on I/O errors.
    fn append_terminal(&self, line: &str) -> io::Result<()> {
        let mut attempt = 1;
        loop {
            match self.files.append_log(line) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < TERMINAL_WRITE_ATTEMPTS => {
                    tracing::warn!(run_id = %self.files.id(), attempt, error = %e, "Retrying terminal log line");
                    attempt += 1;
                    thread::sleep(TERMINAL_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn run_all(&self, series: &[Series], summary: &mut RunSummary) -> Result<(), RunError> {
        for (i, s) in series.iter().enumerate() {
            if i > 0 {
                thread::sleep(self.config.series_delay);
            }
            match self.run_series(i + 1, s)? {
                SeriesOutcome::Persisted => summary.succeeded += 1,
                SeriesOutcome::Skipped => summary.failed += 1,
            }
        }
        Ok(())
    }

    /// Run one series. Missing inputs and persistence failures are logged and
    /// skip the series; only log write failures abort the run.
    fn run_series(&self, index: usize, series: &Series) -> Result<SeriesOutcome, RunError> {
        let log = |line: &str| self.files.append_log(line);

        log(&format!("=== Series {index} ==="))?;

        let inputs = match resolve_inputs(self.formulas.inputs(), series, index) {
            Ok(inputs) => inputs,
            Err(missing) => {
                tracing::warn!(run_id = %self.files.id(), series = index, parameter = %missing.name, "Missing parameter");
                log(&format!(
                    "[ERROR] Series {index}: missing parameter '{}'",
                    missing.name
                ))?;
                return Ok(SeriesOutcome::Skipped);
            }
        };

        let params = self
            .formulas
            .inputs()
            .iter()
            .zip(&inputs)
            .map(|(name, v)| format!("{name}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        log(&format!("Parameters: {params}"))?;

        let outputs = self.formulas.evaluate(&inputs);
        for output in &outputs {
            log(&format!("   {}: {:.4}", output.label, output.value))?;
            thread::sleep(self.config.step_delay);
        }

        let persisted = self
            .result_row(index, &inputs, &outputs)
            .and_then(|row| self.files.append_row(&row));

        if let Err(e) = persisted {
            tracing::error!(run_id = %self.files.id(), series = index, error = %e, "Failed to persist results");
            log(&format!(
                "[ERROR] Series {index}: failed to persist results: {e}"
            ))?;
            return Ok(SeriesOutcome::Skipped);
        }

        log(&format!("Series {index} complete."))?;
        Ok(SeriesOutcome::Persisted)
    }

    /// Build the row for one series. Outputs that don't match the formula
    /// set's declared columns are refused like a store header mismatch.
    fn result_row(
        &self,
        index: usize,
        inputs: &[f64],
        outputs: &[Output],
    ) -> Result<ResultRow, StoreError> {
        let declared = self.formulas.outputs();
        let matches = outputs.len() == declared.len()
            && outputs.iter().zip(declared).all(|(o, d)| o.column == *d);
        if !matches {
            let mut found = self.columns[..1 + inputs.len()].to_vec();
            found.extend(outputs.iter().map(|o| o.column.to_string()));
            return Err(StoreError::HeaderMismatch {
                expected: self.columns.clone(),
                found,
            });
        }

        let mut values = Vec::with_capacity(self.columns.len());
        values.push(index as f64);
        values.extend_from_slice(inputs);
        values.extend(outputs.iter().map(|o| o.value));
        Ok(ResultRow {
            columns: self.columns.clone(),
            values,
        })
    }
}

/// Look up every required input by exact name.
fn resolve_inputs(
    names: &[&str],
    series: &Series,
    index: usize,
) -> Result<Vec<f64>, MissingParameter> {
    names
        .iter()
        .map(|name| {
            series.get(name).ok_or_else(|| MissingParameter {
                name: name.to_string(),
                series: index,
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
