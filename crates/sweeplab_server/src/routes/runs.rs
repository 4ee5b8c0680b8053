use axum::{Router, routing::get};

use crate::handlers;
use crate::state::SharedState;

pub fn run_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/runs", get(handlers::list_runs))
        .route("/api/runs/{id}", get(handlers::get_run))
        // Aggregated results
        .route("/api/history", get(handlers::get_history))
        .route("/api/history.csv", get(handlers::get_history_csv))
}
