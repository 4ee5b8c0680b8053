use axum::{Router, routing::post};

use crate::handlers;
use crate::state::SharedState;

pub fn sweep_routes() -> Router<SharedState> {
    Router::new()
        // Session inputs
        .route("/api/parameters", post(handlers::upload_parameters))
        .route("/api/series", post(handlers::add_series))
        // Start runs
        .route("/api/run", post(handlers::run_now))
        .route("/api/sweeps", post(handlers::run_sweep))
}
