use axum::{Json, extract::State};
use serde::Serialize;
use sweeplab_core::session::{LoadedParameters, Started};
use sweeplab_core::spec::{FileSummary, ParameterFile, ParameterSpec};
use sweeplab_core::store::RunId;
use sweeplab_core::sweep::{self, Series};

use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ParametersResponse {
    #[serde(flatten)]
    pub summary: FileSummary,
    /// Series the loaded document expands to
    pub series_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    /// Series queued for the next run
    pub pending: usize,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    /// `None` when the sweep was empty and nothing was started
    pub run_id: Option<RunId>,
    pub series_count: usize,
}

impl From<Option<Started>> for RunResponse {
    fn from(started: Option<Started>) -> Self {
        match started {
            Some(started) => RunResponse {
                run_id: Some(started.run_id),
                series_count: started.series_count,
            },
            None => RunResponse {
                run_id: None,
                series_count: 0,
            },
        }
    }
}

// ============================================================================
// Sweep Handlers
// ============================================================================

/// Load a YAML or JSON parameter document, replacing the current one.
pub async fn upload_parameters(
    State(state): State<SharedState>,
    body: String,
) -> ApiResult<Json<ParametersResponse>> {
    let loaded = LoadedParameters::resolve(ParameterFile::parse(&body)?)?;
    let series_count = loaded.series_count();
    let summary = state.session().set_parameters(loaded);

    Ok(Json(ParametersResponse {
        summary,
        series_count,
    }))
}

/// Queue one hand-assembled series, given as a flat `{name: value}` map.
pub async fn add_series(
    State(state): State<SharedState>,
    Json(series): Json<Series>,
) -> ApiResult<Json<SeriesResponse>> {
    let pending = state.session().add_series(series);
    tracing::debug!(pending, "Series queued");
    Ok(Json(SeriesResponse { pending }))
}

/// Run the queued series, or the loaded document's sweep when none are queued.
pub async fn run_now(State(state): State<SharedState>) -> ApiResult<Json<RunResponse>> {
    let started = tokio::task::spawn_blocking(move || {
        let mut session = state.session();
        let started = session.run_now()?;
        if started.is_some() {
            session.clear_series();
        }
        ApiResult::Ok(started)
    })
    .await??;

    Ok(Json(started.into()))
}

/// Expand the parameters in the request body and run it right away.
pub async fn run_sweep(
    State(state): State<SharedState>,
    Json(spec): Json<ParameterSpec>,
) -> ApiResult<Json<RunResponse>> {
    let series = sweep::expand(&spec)?.into_series();
    let started = tokio::task::spawn_blocking(move || {
        let started = state.session().run_series(series)?;
        ApiResult::Ok(started)
    })
    .await??;

    Ok(Json(started.into()))
}
