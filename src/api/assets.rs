use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::files::{file_response, Disposition};
use crate::db::models::AssetRecord;
use crate::db::queries;
use crate::db::queries::{AssetFilters, NewAssetInput, UpdateAssetInput};
use crate::domain::codes::{parse_or, AssetStatus};
use crate::domain::time::parse_date;
use crate::domain::token::public_asset_url;
use crate::error::{AppError, AppResult};
use crate::report::{label, qr};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assets", get(list_assets).post(create_asset))
        .route(
            "/assets/{asset_id}",
            get(get_asset).patch(update_asset).delete(delete_asset),
        )
        .route("/assets/{asset_id}/qr.png", get(asset_qr))
        .route("/assets/{asset_id}/label.pdf", get(asset_label))
}

#[derive(Debug, Deserialize)]
struct AssetListQuery {
    status: Option<String>,
    site: Option<String>,
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateAssetRequest {
    site_id: String,
    name: String,
    #[serde(default)]
    asset_type: String,
    #[serde(default)]
    serial: String,
    #[serde(default)]
    vendor: String,
    purchase_date: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateAssetRequest {
    name: Option<String>,
    asset_type: Option<String>,
    serial: Option<String>,
    vendor: Option<String>,
    purchase_date: Option<String>,
    status: Option<String>,
}

/// Asset row together with the URL its QR code points at.
#[derive(Debug, Serialize)]
pub struct AssetResponse {
    #[serde(flatten)]
    pub asset: AssetRecord,
    pub public_url: String,
}

impl AssetResponse {
    pub fn new(base_url: &str, asset: AssetRecord) -> Self {
        let public_url = public_asset_url(base_url, &asset.qr_token);
        Self { asset, public_url }
    }
}

async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<AssetListQuery>,
) -> AppResult<Json<Vec<AssetResponse>>> {
    let assets = queries::list_assets(
        &state.db,
        AssetFilters {
            status: query.status,
            site_id: query.site,
            query: query.q,
        },
    )
    .await?;

    let payload = assets
        .into_iter()
        .map(|asset| AssetResponse::new(&state.config.base_url, asset))
        .collect();

    Ok(Json(payload))
}

async fn create_asset(
    State(state): State<AppState>,
    Json(payload): Json<CreateAssetRequest>,
) -> AppResult<(StatusCode, Json<AssetResponse>)> {
    let asset = queries::create_asset(
        &state.db,
        NewAssetInput {
            site_id: payload.site_id,
            name: payload.name,
            asset_type: payload.asset_type,
            serial: payload.serial,
            vendor: payload.vendor,
            purchase_date: parse_date(payload.purchase_date.as_deref()),
            status: parse_or(payload.status.as_deref(), AssetStatus::parse, AssetStatus::Active),
        },
    )
    .await?;

    tracing::info!(asset_id = %asset.id, site_id = %asset.site_id, "asset registered");
    Ok((
        StatusCode::CREATED,
        Json(AssetResponse::new(&state.config.base_url, asset)),
    ))
}

async fn get_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> AppResult<Json<AssetResponse>> {
    let asset = queries::get_asset(&state.db, &asset_id).await?;
    Ok(Json(AssetResponse::new(&state.config.base_url, asset)))
}

async fn update_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Json(payload): Json<UpdateAssetRequest>,
) -> AppResult<Json<AssetResponse>> {
    if payload.name.is_none()
        && payload.asset_type.is_none()
        && payload.serial.is_none()
        && payload.vendor.is_none()
        && payload.purchase_date.is_none()
        && payload.status.is_none()
    {
        return Err(AppError::BadRequest(
            "at least one field must be provided".to_string(),
        ));
    }

    let asset = queries::update_asset(
        &state.db,
        &asset_id,
        UpdateAssetInput {
            name: payload.name,
            asset_type: payload.asset_type,
            serial: payload.serial,
            vendor: payload.vendor,
            purchase_date: payload
                .purchase_date
                .map(|raw| parse_date(Some(&raw))),
            status: payload
                .status
                .map(|raw| parse_or(Some(&raw), AssetStatus::parse, AssetStatus::Active)),
        },
    )
    .await?;

    Ok(Json(AssetResponse::new(&state.config.base_url, asset)))
}

async fn delete_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> AppResult<StatusCode> {
    queries::delete_asset(&state.db, &asset_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn asset_qr(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> AppResult<Response> {
    let asset = queries::get_asset(&state.db, &asset_id).await?;
    let url = public_asset_url(&state.config.base_url, &asset.qr_token);
    let png = qr::render_png(&url)?;

    Ok(file_response(
        png,
        "image/png",
        Disposition::Inline,
        &format!("asset-{}-qr.png", asset.id),
    ))
}

async fn asset_label(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> AppResult<Response> {
    let asset = queries::get_asset(&state.db, &asset_id).await?;
    let url = public_asset_url(&state.config.base_url, &asset.qr_token);
    let pdf = label::render_label(&asset, &url)?;

    Ok(file_response(
        pdf,
        "application/pdf",
        Disposition::Attachment,
        &format!("asset-{}-label.pdf", asset.id),
    ))
}
