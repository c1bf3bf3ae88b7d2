use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{TemplateDetails, TemplateItemRecord, TemplateRecord};
use crate::db::queries;
use crate::db::queries::{NewTemplateInput, TemplateItemInput, UpdateTemplateItemInput};
use crate::domain::codes::{parse_or, ItemType};
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/{template_id}",
            get(get_template).delete(delete_template),
        )
        .route("/templates/{template_id}/items", post(add_item))
        .route(
            "/templates/{template_id}/items/{item_id}",
            patch(update_item).delete(delete_item),
        )
}

#[derive(Debug, Deserialize)]
struct TemplateListQuery {
    site: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateTemplateRequest {
    name: String,
    site_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateItemRequest {
    label: String,
    item_type: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    order: i64,
}

#[derive(Debug, Deserialize)]
struct UpdateTemplateItemRequest {
    label: Option<String>,
    item_type: Option<String>,
    required: Option<bool>,
    unit: Option<String>,
    order: Option<i64>,
}

async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateListQuery>,
) -> AppResult<Json<Vec<TemplateRecord>>> {
    let templates = queries::list_templates(&state.db, query.site.as_deref()).await?;
    Ok(Json(templates))
}

async fn create_template(
    State(state): State<AppState>,
    Json(payload): Json<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<TemplateRecord>)> {
    let template = queries::create_template(
        &state.db,
        NewTemplateInput {
            name: payload.name,
            site_id: payload.site_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> AppResult<Json<TemplateDetails>> {
    let details = queries::get_template_details(&state.db, &template_id).await?;
    Ok(Json(details))
}

async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> AppResult<StatusCode> {
    queries::delete_template(&state.db, &template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_item(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(payload): Json<TemplateItemRequest>,
) -> AppResult<(StatusCode, Json<TemplateItemRecord>)> {
    let item = queries::add_template_item(
        &state.db,
        &template_id,
        TemplateItemInput {
            label: payload.label,
            item_type: parse_or(payload.item_type.as_deref(), ItemType::parse, ItemType::YesNo),
            required: payload.required,
            unit: payload.unit,
            position: payload.order,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    Path((template_id, item_id)): Path<(String, String)>,
    Json(payload): Json<UpdateTemplateItemRequest>,
) -> AppResult<Json<TemplateItemRecord>> {
    let item = queries::update_template_item(
        &state.db,
        &template_id,
        &item_id,
        UpdateTemplateItemInput {
            label: payload.label,
            item_type: payload
                .item_type
                .map(|raw| parse_or(Some(&raw), ItemType::parse, ItemType::YesNo)),
            required: payload.required,
            unit: payload.unit,
            position: payload.order,
        },
    )
    .await?;

    Ok(Json(item))
}

async fn delete_item(
    State(state): State<AppState>,
    Path((template_id, item_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    queries::delete_template_item(&state.db, &template_id, &item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
