//! Aggregated view over every run's results store.
//!
//! The view is rebuilt from disk on every call and never written back.
//! Runs without a results store contribute nothing; stores that can't be
//! read or parsed are skipped with a warning.

use std::io::Write;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::StoreError;
use crate::store::{ResultsTable, RunId, RunsDirectory};

/// Name of the run column appended on export
pub const RUN_COLUMN: &str = "run";

/// A result row tagged with its run
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub run: RunId,
    /// One value per [`HistoryView::columns`] entry; `None` where the run's
    /// store doesn't have that column
    pub values: Vec<Option<f64>>,
}

/// Union of all runs' results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryView {
    columns: Vec<String>,
    rows: Vec<HistoryRow>,
}

impl HistoryView {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Distinct runs present in the view, in view order
    pub fn runs(&self) -> Vec<&RunId> {
        let mut runs: Vec<&RunId> = Vec::new();
        for row in &self.rows {
            if runs.last() != Some(&&row.run) {
                runs.push(&row.run);
            }
        }
        runs
    }

    /// All values of a column, row by row
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// `(x, y)` pairs sorted by x, skipping rows that lack either value.
    pub fn xy(&self, x: &str, y: &str) -> Option<Vec<(f64, f64)>> {
        let (xi, yi) = (self.column_index(x)?, self.column_index(y)?);
        let mut points: Vec<(f64, f64)> = self
            .rows
            .iter()
            .filter_map(|r| Some((r.values[xi]?, r.values[yi]?)))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(points)
    }

    /// `(x, y, z)` triples for scatter plots, in row order.
    pub fn xyz(&self, x: &str, y: &str, z: &str) -> Option<Vec<(f64, f64, f64)>> {
        let (xi, yi, zi) = (
            self.column_index(x)?,
            self.column_index(y)?,
            self.column_index(z)?,
        );
        Some(
            self.rows
                .iter()
                .filter_map(|r| Some((r.values[xi]?, r.values[yi]?, r.values[zi]?)))
                .collect(),
        )
    }

    /// Export as CSV: every column plus a trailing `run` column. Missing
    /// values are written as empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), StoreError> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        header.push(RUN_COLUMN);
        csv.write_record(&header)?;

        for row in &self.rows {
            let mut record: Vec<String> = row
                .values
                .iter()
                .map(|v| v.map(|v| v.to_string()).unwrap_or_default())
                .collect();
            record.push(row.run.to_string());
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }

    fn push_table(&mut self, run: RunId, table: ResultsTable) {
        let mapping: Vec<usize> = table
            .headers
            .iter()
            .map(|h| match self.column_index(h) {
                Some(i) => i,
                None => {
                    self.columns.push(h.clone());
                    for row in &mut self.rows {
                        row.values.push(None);
                    }
                    self.columns.len() - 1
                }
            })
            .collect();

        for values in table.rows {
            let mut aligned = vec![None; self.columns.len()];
            for (src, v) in values.into_iter().enumerate() {
                aligned[mapping[src]] = Some(v);
            }
            self.rows.push(HistoryRow {
                run: run.clone(),
                values: aligned,
            });
        }
    }
}

/// Rows serialize as `{column: value, ..., "run": id}`, the shape of the
/// exported CSV.
impl Serialize for HistoryView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Row<'a>(&'a [String], &'a HistoryRow);

        impl Serialize for Row<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let Row(columns, row) = self;
                let mut map = serializer.serialize_map(Some(columns.len() + 1))?;
                for (column, value) in columns.iter().zip(&row.values) {
                    map.serialize_entry(column, value)?;
                }
                map.serialize_entry(RUN_COLUMN, &row.run)?;
                map.end()
            }
        }

        serializer.collect_seq(self.rows.iter().map(|r| Row(&self.columns, r)))
    }
}

fn load_table(runs: &RunsDirectory, id: &RunId) -> Option<ResultsTable> {
    let files = runs.run(id).ok()?;
    match files.read_results() {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!(run_id = %id, error = %e, "Skipping unreadable results store");
            None
        }
    }
}

/// Read every run's results store and concatenate the rows, oldest run first.
pub fn load_history(runs: &RunsDirectory) -> HistoryView {
    let ids = match runs.list_runs() {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(root = %runs.root().display(), error = %e, "Cannot list runs");
            return HistoryView::default();
        }
    };

    #[cfg(feature = "parallel")]
    let tables: Vec<(RunId, Option<ResultsTable>)> = ids
        .into_par_iter()
        .map(|id| {
            let table = load_table(runs, &id);
            (id, table)
        })
        .collect();

    #[cfg(not(feature = "parallel"))]
    let tables: Vec<(RunId, Option<ResultsTable>)> = ids
        .into_iter()
        .map(|id| {
            let table = load_table(runs, &id);
            (id, table)
        })
        .collect();

    let mut view = HistoryView::default();
    for (id, table) in tables {
        if let Some(table) = table {
            view.push_table(id, table);
        }
    }

    tracing::debug!(rows = view.len(), columns = view.columns.len(), "Loaded history");
    view
}
