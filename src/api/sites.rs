use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{SiteDetails, SiteRecord, SiteSummary};
use crate::db::queries;
use crate::db::queries::{NewSiteInput, UpdateSiteInput};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sites", get(list_sites).post(create_site))
        .route(
            "/sites/{site_id}",
            get(get_site).patch(update_site).delete(delete_site),
        )
}

#[derive(Debug, Deserialize)]
struct SiteListQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateSiteRequest {
    name: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Deserialize)]
struct UpdateSiteRequest {
    name: Option<String>,
    address: Option<String>,
    notes: Option<String>,
}

async fn list_sites(
    State(state): State<AppState>,
    Query(query): Query<SiteListQuery>,
) -> AppResult<Json<Vec<SiteSummary>>> {
    let sites = queries::list_sites(&state.db, query.q.as_deref()).await?;
    Ok(Json(sites))
}

async fn create_site(
    State(state): State<AppState>,
    Json(payload): Json<CreateSiteRequest>,
) -> AppResult<(StatusCode, Json<SiteRecord>)> {
    let site = queries::create_site(
        &state.db,
        NewSiteInput {
            name: payload.name,
            address: payload.address,
            notes: payload.notes,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(site)))
}

async fn get_site(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> AppResult<Json<SiteDetails>> {
    let details = queries::get_site_details(&state.db, &site_id).await?;
    Ok(Json(details))
}

async fn update_site(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    Json(payload): Json<UpdateSiteRequest>,
) -> AppResult<Json<SiteRecord>> {
    if payload.name.is_none() && payload.address.is_none() && payload.notes.is_none() {
        return Err(AppError::BadRequest(
            "at least one field must be provided".to_string(),
        ));
    }

    let site = queries::update_site(
        &state.db,
        &site_id,
        UpdateSiteInput {
            name: payload.name,
            address: payload.address,
            notes: payload.notes,
        },
    )
    .await?;

    Ok(Json(site))
}

async fn delete_site(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> AppResult<StatusCode> {
    let orphaned = queries::delete_site(&state.db, &site_id).await?;
    for key in &orphaned {
        state.files.remove(key).await;
    }

    tracing::info!(site_id = %site_id, removed_files = orphaned.len(), "site deleted");
    Ok(StatusCode::NO_CONTENT)
}
