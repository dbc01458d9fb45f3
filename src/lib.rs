// Library exports for pintrip
// This allows integration tests and the binary to share the router

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod query;
pub mod rating;
pub mod routes;
pub mod state;
pub mod votes;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application: the `/api` tree with request tracing and CORS.
pub fn build_router(state: AppState) -> Router {
    routes::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
