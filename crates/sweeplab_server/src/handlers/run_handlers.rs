use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use sweeplab_core::store::{RunId, RunProgress};

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct RunListItem {
    pub run_id: RunId,
    pub running: bool,
}

fn parse_run_id(id: &str) -> ApiResult<RunId> {
    RunId::parse(id).map_err(ApiError::InvalidRunId)
}

// ============================================================================
// Run Handlers
// ============================================================================

/// Every run on disk, oldest first.
pub async fn list_runs(State(state): State<SharedState>) -> ApiResult<Json<Vec<RunListItem>>> {
    let runs = tokio::task::spawn_blocking(move || {
        let mut items = Vec::new();
        for run_id in state.runs.list_runs()? {
            let status = state.session().status(&run_id);
            let running = state
                .runs
                .progress(&run_id)?
                .is_some_and(|p| p.with_state(status).running);
            items.push(RunListItem { run_id, running });
        }
        ApiResult::Ok(items)
    })
    .await??;

    Ok(Json(runs))
}

/// Poll a run: log so far and whether it is still going. The session's
/// record of the run wins over a log that lacks its terminal marker.
pub async fn get_run(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RunProgress>> {
    let run_id = parse_run_id(&id)?;
    let progress = tokio::task::spawn_blocking(move || {
        let progress = state.runs.progress(&run_id)?;
        let status = state.session().status(&run_id);
        ApiResult::Ok(progress.map(|p| p.with_state(status)))
    })
    .await??;

    progress.map(Json).ok_or(ApiError::RunNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::sweep_handlers::{run_now, upload_parameters};
    use crate::handlers::test_support::{test_state, wait_for_runs};

    #[tokio::test]
    async fn test_poll_run_until_complete() {
        let (_temp, state) = test_state();
        upload_parameters(
            State(state.clone()),
            "m: 1\ng: 9.8\nh: [1, 2]\nV: 3\nT: 25\nSPECIFIC_HEAT: 1\n".to_string(),
        )
        .await
        .unwrap();
        let Json(started) = run_now(State(state.clone())).await.unwrap();
        let run_id = started.run_id.unwrap();

        wait_for_runs(&state);

        let Json(progress) = get_run(State(state.clone()), Path(run_id.to_string()))
            .await
            .unwrap();
        assert!(!progress.running);
        assert!(progress.log.contains("=== Series 2 ==="));
        assert!(progress.log.ends_with("ALL SERIES COMPLETE\n"));

        let Json(runs) = list_runs(State(state)).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, run_id);
        assert!(!runs[0].running);
    }

    #[tokio::test]
    async fn test_finished_run_without_marker_is_not_running() {
        let (_temp, state) = test_state();
        upload_parameters(
            State(state.clone()),
            "m: 1\ng: 9.8\nh: 1\nV: 3\nT: 25\nSPECIFIC_HEAT: 1\n".to_string(),
        )
        .await
        .unwrap();
        let Json(started) = run_now(State(state.clone())).await.unwrap();
        let run_id = started.run_id.unwrap();

        while !state.session().status(&run_id).is_some_and(|s| s.is_finished()) {
            tokio::task::yield_now().await;
        }

        // Simulate a terminal line that never reached the log
        let files = state.runs.run(&run_id).unwrap();
        let log = files.read_log().unwrap().replace("ALL SERIES COMPLETE\n", "");
        std::fs::write(files.log_path(), log).unwrap();
        assert!(state.runs.progress(&run_id).unwrap().unwrap().running);

        let Json(progress) = get_run(State(state.clone()), Path(run_id.to_string()))
            .await
            .unwrap();
        assert!(!progress.running);

        let Json(runs) = list_runs(State(state)).await.unwrap();
        assert!(!runs[0].running);
    }

    #[tokio::test]
    async fn test_unknown_run_is_404() {
        let (_temp, state) = test_state();
        let err = get_run(State(state), Path("2000-01-01_00-00-00".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn test_path_like_run_id_is_rejected() {
        let (_temp, state) = test_state();
        let err = get_run(State(state), Path("..".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRunId(_)));
    }

    #[tokio::test]
    async fn test_no_runs() {
        let (_temp, state) = test_state();
        let Json(runs) = list_runs(State(state)).await.unwrap();
        assert!(runs.is_empty());
    }
}
