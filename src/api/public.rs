use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::api::assets::AssetResponse;
use crate::db::models::{AssetChecklistEntry, TaskRecord};
use crate::db::queries;
use crate::error::AppResult;
use crate::state::AppState;

/// Landing route encoded in asset QR codes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/a/{token}", get(asset_by_token))
        .route("/a/{token}/", get(asset_by_token))
}

#[derive(Debug, Serialize)]
struct AssetPageResponse {
    asset: AssetResponse,
    tasks: Vec<TaskRecord>,
    checklist_items: Vec<AssetChecklistEntry>,
}

async fn asset_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<AssetPageResponse>> {
    let overview = queries::get_asset_overview(&state.db, &token).await?;

    Ok(Json(AssetPageResponse {
        asset: AssetResponse::new(&state.config.base_url, overview.asset),
        tasks: overview.tasks,
        checklist_items: overview.checklist_items,
    }))
}
