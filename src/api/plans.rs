use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::PlanRecord;
use crate::db::queries;
use crate::db::queries::{NewPlanInput, UpdatePlanInput};
use crate::domain::codes::{parse_or, PlanFrequency};
use crate::domain::time::parse_date;
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route(
            "/plans/{plan_id}",
            get(get_plan).patch(update_plan).delete(delete_plan),
        )
}

#[derive(Debug, Deserialize)]
struct PlanListQuery {
    site: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePlanRequest {
    site_id: String,
    title: String,
    frequency: Option<String>,
    next_due: Option<String>,
    active: Option<bool>,
    assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdatePlanRequest {
    title: Option<String>,
    frequency: Option<String>,
    next_due: Option<String>,
    active: Option<bool>,
    assigned_to: Option<String>,
}

fn assignee(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<PlanListQuery>,
) -> AppResult<Json<Vec<PlanRecord>>> {
    let plans = queries::list_plans(&state.db, query.site.as_deref()).await?;
    Ok(Json(plans))
}

async fn create_plan(
    State(state): State<AppState>,
    Json(payload): Json<CreatePlanRequest>,
) -> AppResult<(StatusCode, Json<PlanRecord>)> {
    let plan = queries::create_plan(
        &state.db,
        NewPlanInput {
            site_id: payload.site_id,
            title: payload.title,
            frequency: parse_or(
                payload.frequency.as_deref(),
                PlanFrequency::parse,
                PlanFrequency::Monthly,
            ),
            next_due: parse_date(payload.next_due.as_deref()),
            active: payload.active.unwrap_or(true),
            assigned_to: assignee(payload.assigned_to.as_deref()),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(plan)))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> AppResult<Json<PlanRecord>> {
    let plan = queries::get_plan(&state.db, &plan_id).await?;
    Ok(Json(plan))
}

async fn update_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
    Json(payload): Json<UpdatePlanRequest>,
) -> AppResult<Json<PlanRecord>> {
    let plan = queries::update_plan(
        &state.db,
        &plan_id,
        UpdatePlanInput {
            title: payload.title,
            frequency: payload
                .frequency
                .map(|raw| parse_or(Some(&raw), PlanFrequency::parse, PlanFrequency::Monthly)),
            next_due: payload.next_due.map(|raw| parse_date(Some(&raw))),
            active: payload.active,
            assigned_to: payload.assigned_to.map(|raw| assignee(Some(&raw))),
        },
    )
    .await?;

    Ok(Json(plan))
}

async fn delete_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> AppResult<StatusCode> {
    queries::delete_plan(&state.db, &plan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
