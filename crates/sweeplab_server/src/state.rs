//! Shared server state. Each request locks the session only for as long as it
//! takes to read or start something; runs execute on their own threads.

use std::sync::{Arc, Mutex, MutexGuard};

use sweeplab_core::formula::FormulaSet;
use sweeplab_core::runner::{RunnerConfig, SeriesRunner};
use sweeplab_core::session::SweepSession;
use sweeplab_core::store::RunsDirectory;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub runs: RunsDirectory,
    pub session: Mutex<SweepSession>,
}

impl AppState {
    pub fn new(
        runs: RunsDirectory,
        formulas: Arc<dyn FormulaSet>,
        config: RunnerConfig,
    ) -> SharedState {
        let runner = SeriesRunner::new(runs.clone(), formulas, config);
        Arc::new(Self {
            runs,
            session: Mutex::new(SweepSession::new(runner)),
        })
    }

    /// Lock the session. A panic in another request leaves the lock poisoned
    /// but the session itself consistent, so the guard is recovered.
    pub fn session(&self) -> MutexGuard<'_, SweepSession> {
        self.session.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Session lock was poisoned, recovering");
            self.session.clear_poison();
            poisoned.into_inner()
        })
    }
}
