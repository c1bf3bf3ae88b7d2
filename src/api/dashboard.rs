use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::db::models::Dashboard;
use crate::db::queries;
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

async fn dashboard(State(state): State<AppState>) -> AppResult<Json<Dashboard>> {
    let dashboard = queries::dashboard(&state.db).await?;
    Ok(Json(dashboard))
}
