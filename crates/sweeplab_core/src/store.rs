//! Per-run storage.
//!
//! Directory structure:
//! ```text
//! {root}/
//!   2026-10-18_14-03-59/
//!     log.txt        # append-only run log
//!     results.csv    # header + one row per completed series
//!   2026-10-18_14-03-59_2/
//!     ...
//! ```

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::io::atomic_write;
use crate::runner::{RunState, log_is_terminal};

const LOG_FILE: &str = "log.txt";
const RESULTS_FILE: &str = "results.csv";
const RUN_ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
/// Length of a formatted `RUN_ID_FORMAT` timestamp
const TIMESTAMP_LEN: usize = 19;

/// Identifier of a run, derived from its start time
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Validate an id coming from outside (CLI argument, URL path).
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted, so an id can never
    /// name anything outside the runs directory.
    pub fn parse(s: &str) -> Result<Self, String> {
        let valid = !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("invalid run id '{s}'"))
        }
    }

    fn timestamp() -> Self {
        Self(jiff::Zoned::now().strftime(RUN_ID_FORMAT).to_string())
    }

    fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}_{n}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chronological ordering key: `_10` sorts after `_9`.
    fn sort_key(&self) -> (&str, u64) {
        if let Some((base, n)) = self.0.rsplit_once('_')
            && base.len() == TIMESTAMP_LEN
            && let Ok(n) = n.parse()
        {
            return (base, n);
        }
        (&self.0, 1)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

/// One row of a results store
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub columns: Vec<String>,
    pub values: Vec<f64>,
}

/// Contents of a results store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl ResultsTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value of `column` in row `row`
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }
}

/// Accumulated log text and whether the run is still going
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunProgress {
    pub run_id: RunId,
    pub log: String,
    pub running: bool,
}

impl RunProgress {
    /// Take the run's in-memory state into account: a run whose handle has
    /// finished is over even if its terminal marker never reached the log.
    pub fn with_state(mut self, state: Option<RunState>) -> Self {
        if state.is_some_and(RunState::is_finished) {
            self.running = false;
        }
        self
    }
}

/// The root directory holding every run
#[derive(Debug, Clone)]
pub struct RunsDirectory {
    root: PathBuf,
}

impl RunsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh run directory with a unique timestamp-derived id.
    pub fn create_run(&self) -> Result<RunFiles, StoreError> {
        fs::create_dir_all(&self.root)?;

        let base = RunId::timestamp();
        let mut id = base.clone();
        let mut n = 1;
        loop {
            // create_dir (not create_dir_all) fails if the name is taken,
            // so two runs started in the same second can't share a directory
            match fs::create_dir(self.root.join(id.as_str())) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    n += 1;
                    id = base.with_suffix(n);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(run_id = %id, "Created run directory");
        Ok(self.run_files(id))
    }

    fn run_files(&self, id: RunId) -> RunFiles {
        RunFiles {
            dir: self.root.join(id.as_str()),
            id,
        }
    }

    /// Files of an existing run
    pub fn run(&self, id: &RunId) -> Result<RunFiles, StoreError> {
        let files = self.run_files(id.clone());
        if files.dir.is_dir() {
            Ok(files)
        } else {
            Err(StoreError::RunNotFound(id.to_string()))
        }
    }

    /// All run ids, oldest first. A missing root means no runs.
    pub fn list_runs(&self) -> Result<Vec<RunId>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids: Vec<RunId> = entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| entry.file_name().to_str().and_then(|s| RunId::parse(s).ok()))
            .collect();
        ids.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(ids)
    }

    /// Poll a run: its log so far and whether the terminal marker is present.
    ///
    /// Returns `None` for an unknown run. A run whose log hasn't been created
    /// yet counts as running with an empty log.
    pub fn progress(&self, id: &RunId) -> Result<Option<RunProgress>, StoreError> {
        let files = match self.run(id) {
            Ok(files) => files,
            Err(StoreError::RunNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let log = files.read_log()?;
        Ok(Some(RunProgress {
            run_id: id.clone(),
            running: !log_is_terminal(&log),
            log,
        }))
    }
}

/// Paths owned by a single run
#[derive(Debug, Clone)]
pub struct RunFiles {
    id: RunId,
    dir: PathBuf,
}

impl RunFiles {
    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    /// Append one line to the run log.
    pub fn append_log(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        // Single write so a concurrent reader sees whole lines
        file.write_all(format!("{line}\n").as_bytes())
    }

    /// The log so far; empty if nothing has been written yet.
    pub fn read_log(&self) -> io::Result<String> {
        match fs::read_to_string(self.log_path()) {
            Ok(log) => Ok(log),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// The results store, or `None` if no series has completed yet.
    pub fn read_results(&self) -> Result<Option<ResultsTable>, StoreError> {
        read_results_file(&self.results_path())
    }

    /// Append a row by rewriting the store into a temporary file and renaming
    /// it over the live one.
    pub fn append_row(&self, row: &ResultRow) -> Result<(), StoreError> {
        let mut table = self.read_results()?.unwrap_or_else(|| ResultsTable {
            headers: row.columns.clone(),
            rows: Vec::new(),
        });

        if table.headers != row.columns {
            return Err(StoreError::HeaderMismatch {
                expected: table.headers,
                found: row.columns.clone(),
            });
        }
        table.rows.push(row.values.clone());

        let mut writer = csv::Writer::from_writer(Vec::new());
        write_table(&mut writer, &table)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;

        atomic_write(&self.results_path(), &bytes)?;
        Ok(())
    }
}

fn write_table<W: Write>(writer: &mut csv::Writer<W>, table: &ResultsTable) -> csv::Result<()> {
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    Ok(())
}

/// Read a results CSV. Every cell must be numeric.
pub(crate) fn read_results_file(path: &Path) -> Result<Option<ResultsTable>, StoreError> {
    let mut reader = match csv::ReaderBuilder::new().has_headers(true).from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            if let csv::ErrorKind::Io(io_err) = e.kind()
                && io_err.kind() == io::ErrorKind::NotFound
            {
                return Ok(None);
            }
            return Err(e.into());
        }
    };

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .zip(&headers)
            .map(|(cell, column)| {
                cell.trim().parse::<f64>().map_err(|_| StoreError::InvalidCell {
                    column: column.clone(),
                    value: cell.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }

    Ok(Some(ResultsTable { headers, rows }))
}
