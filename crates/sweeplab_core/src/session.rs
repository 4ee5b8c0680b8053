//! Explicit per-session state: the loaded parameters, manually assembled
//! series and the runs started from them.

use std::collections::HashMap;

use crate::error::{SessionError, SpecError, StoreError};
use crate::runner::{RunHandle, RunState, SeriesRunner};
use crate::spec::{FileSummary, ParameterFile, ParameterSpec};
use crate::store::{RunId, RunProgress};
use crate::sweep::{self, Series};

/// Result of triggering a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub run_id: RunId,
    pub series_count: usize,
}

/// A parameter document resolved into a size-checked [`ParameterSpec`].
///
/// Resolving needs no session, so callers sharing a session can do it before
/// taking their lock and only swap the result in.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedParameters {
    file: ParameterFile,
    spec: ParameterSpec,
    summary: FileSummary,
    series_count: usize,
}

impl LoadedParameters {
    pub fn resolve(file: ParameterFile) -> Result<Self, SpecError> {
        let spec = file.to_spec()?;
        let series_count = sweep::check_size(&spec)?;
        Ok(Self {
            summary: file.summary(),
            file,
            spec,
            series_count,
        })
    }

    pub fn file(&self) -> &ParameterFile {
        &self.file
    }

    pub fn spec(&self) -> &ParameterSpec {
        &self.spec
    }

    pub fn summary(&self) -> FileSummary {
        self.summary
    }

    /// Series the spec expands to
    pub fn series_count(&self) -> usize {
        self.series_count
    }
}

pub struct SweepSession {
    runner: SeriesRunner,
    loaded: Option<LoadedParameters>,
    added: Vec<Series>,
    /// Handles of runs that may still be going
    runs: HashMap<RunId, RunHandle>,
    /// Final state of runs whose handles were released
    finished: HashMap<RunId, RunState>,
}

impl SweepSession {
    pub fn new(runner: SeriesRunner) -> Self {
        Self {
            runner,
            loaded: None,
            added: Vec::new(),
            runs: HashMap::new(),
            finished: HashMap::new(),
        }
    }

    pub fn runner(&self) -> &SeriesRunner {
        &self.runner
    }

    /// Resolve and replace the loaded parameters. On error the previous ones
    /// are kept.
    pub fn load_parameters(&mut self, file: ParameterFile) -> Result<FileSummary, SpecError> {
        let loaded = LoadedParameters::resolve(file)?;
        Ok(self.set_parameters(loaded))
    }

    /// Replace the loaded parameters with an already resolved document.
    pub fn set_parameters(&mut self, loaded: LoadedParameters) -> FileSummary {
        let summary = loaded.summary();
        tracing::info!(%summary, series = loaded.series_count(), "Loaded parameters");
        self.loaded = Some(loaded);
        summary
    }

    pub fn loaded(&self) -> Option<&LoadedParameters> {
        self.loaded.as_ref()
    }

    pub fn parameters(&self) -> Option<&ParameterFile> {
        self.loaded.as_ref().map(LoadedParameters::file)
    }

    pub fn spec(&self) -> Option<&ParameterSpec> {
        self.loaded.as_ref().map(LoadedParameters::spec)
    }

    /// Queue a hand-assembled series. Returns how many are queued.
    pub fn add_series(&mut self, series: Series) -> usize {
        self.added.push(series);
        self.added.len()
    }

    pub fn clear_series(&mut self) {
        self.added.clear();
    }

    /// What "run now" would execute: the queued series if there are any,
    /// otherwise the expansion of the loaded parameters.
    pub fn pending_series(&self) -> Vec<Series> {
        if !self.added.is_empty() {
            return self.added.clone();
        }
        // Loaded specs passed the size check, so expansion can't be refused
        self.loaded
            .as_ref()
            .and_then(|loaded| sweep::expand(loaded.spec()).ok())
            .map(sweep::Sweep::into_series)
            .unwrap_or_default()
    }

    /// Start a run over [`Self::pending_series`]. `None` when there is
    /// nothing to run.
    pub fn run_now(&mut self) -> Result<Option<Started>, StoreError> {
        let series = self.pending_series();
        self.run_series(series)
    }

    /// Start a run over an explicit list of series.
    pub fn run_series(&mut self, series: Vec<Series>) -> Result<Option<Started>, StoreError> {
        self.release_finished();
        let Some(handle) = self.runner.start(series)? else {
            return Ok(None);
        };

        let started = Started {
            run_id: handle.id().clone(),
            series_count: handle.total(),
        };
        self.runs.insert(started.run_id.clone(), handle);
        Ok(Some(started))
    }

    /// Expand a parameter spec and run it directly, bypassing the session's queue.
    pub fn run_spec(&mut self, spec: &ParameterSpec) -> Result<Option<Started>, SessionError> {
        let series = sweep::expand(spec)?.into_series();
        Ok(self.run_series(series)?)
    }

    /// State of a run started from this session.
    pub fn status(&self, id: &RunId) -> Option<RunState> {
        self.runs
            .get(id)
            .map(RunHandle::state)
            .or_else(|| self.finished.get(id).copied())
    }

    /// Poll a run on disk. Runs this session saw finish are reported as over
    /// even when their log lacks the terminal marker.
    pub fn progress(&self, id: &RunId) -> Result<Option<RunProgress>, StoreError> {
        let progress = self.runner.runs().progress(id)?;
        Ok(progress.map(|p| p.with_state(self.status(id))))
    }

    /// Runs started by this session that haven't finished yet
    pub fn active_runs(&mut self) -> Vec<RunId> {
        self.release_finished();
        let mut ids: Vec<RunId> = self.runs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Take the handle of a run, e.g. to join it.
    pub fn take_handle(&mut self, id: &RunId) -> Option<RunHandle> {
        self.runs.remove(id)
    }

    /// Drop the handles of finished runs, keeping only their final state.
    fn release_finished(&mut self) {
        let done: Vec<RunId> = self
            .runs
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for id in done {
            if let Some(handle) = self.runs.remove(&id) {
                tracing::debug!(run_id = %id, state = ?handle.state(), "Releasing finished run");
                self.finished.insert(id, handle.state());
            }
        }
    }
}
