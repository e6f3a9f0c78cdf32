pub mod config;
pub mod cookie;
pub mod http;
pub mod state;

pub use state::AppState;

use axum::routing::{any, get};
use axum::Router;

/// Builds the router: the single Bayeux transport endpoint plus a couple of
/// ambient liveness probes.
///
/// `/` is routed with `any` rather than `post` so a non-POST request reaches
/// `handle_bayeux` and gets the spec's HTTP 400 instead of axum's default
/// 405 (`SPEC_FULL.md` §6).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(http::bayeux::handle_bayeux))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404() -> axum::http::StatusCode {
    axum::http::StatusCode::NOT_FOUND
}

mod health {
    use axum::response::IntoResponse;

    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }

    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}
