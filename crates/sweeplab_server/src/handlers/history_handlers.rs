use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use sweeplab_core::history::{HistoryView, load_history};

use crate::error::ApiResult;
use crate::state::SharedState;

const CSV_FILENAME: &str = "history.csv";

// ============================================================================
// History Handlers
// ============================================================================

/// All runs' results as `[{column: value, ..., "run": id}]`.
pub async fn get_history(State(state): State<SharedState>) -> ApiResult<Json<HistoryView>> {
    let view = tokio::task::spawn_blocking(move || load_history(&state.runs)).await?;
    Ok(Json(view))
}

/// All runs' results as a CSV download.
pub async fn get_history_csv(State(state): State<SharedState>) -> ApiResult<Response> {
    let csv = tokio::task::spawn_blocking(move || {
        let mut buffer = Vec::new();
        load_history(&state.runs).write_csv(&mut buffer)?;
        ApiResult::Ok(buffer)
    })
    .await??;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{CSV_FILENAME}\""),
            ),
        ],
        csv,
    )
        .into_response())
}
