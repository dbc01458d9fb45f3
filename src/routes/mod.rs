pub mod accounts;
pub mod pins;
pub mod trips;

use axum::Router;

use crate::state::AppState;

/// Every resource router, mounted under `/api`.
pub fn api_router() -> Router<AppState> {
    let api = Router::new()
        .merge(pins::router())
        .merge(accounts::router())
        .merge(trips::router());
    Router::new().nest("/api", api)
}
