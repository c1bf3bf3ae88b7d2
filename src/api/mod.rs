pub mod assets;
pub mod auth;
pub mod checklist;
pub mod dashboard;
pub mod files;
pub mod plans;
pub mod public;
pub mod sites;
pub mod tasks;
pub mod templates;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderMap;
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::domain::codes::{all_choices, ChoiceSets};
use crate::state::AppState;

pub const ACTOR_HEADER: &str = "X-Maintrack-User";

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(sites::router())
        .merge(assets::router())
        .merge(plans::router())
        .merge(templates::router())
        .merge(tasks::router())
        .merge(checklist::router())
        .merge(dashboard::router())
        .route("/choices", get(choices))
}

/// Full application: the JSON API, the token landing route behind bearer
/// auth, and an unauthenticated health check.
pub fn app(state: AppState) -> Router {
    let max_request_body_bytes = state.config.max_request_body_bytes;

    let protected = Router::new()
        .nest("/api/v1", router())
        .merge(public::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(protected)
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(max_request_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthzResponse {
    pub status: &'static str,
}

pub async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse { status: "ok" })
}

async fn choices() -> Json<ChoiceSets> {
    Json(all_choices())
}

/// Free-text name of whoever performs the request, when the client sends one.
pub fn actor_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
