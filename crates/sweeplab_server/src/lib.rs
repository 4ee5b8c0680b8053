//! REST API for running parameter sweeps and reading their results

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// The full API router
pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/", get(|| async { "Sweeplab API Server" }))
        .merge(routes::sweep_routes())
        .merge(routes::run_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
