use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::api::actor_from_headers;
use crate::api::files::{file_response, Disposition};
use crate::db::models::{ChecklistItem, TaskDetails, TaskRecord};
use crate::db::queries;
use crate::db::queries::{AdhocItemInput, NewTaskInput, TaskFilters, UpdateTaskInput};
use crate::domain::codes::{parse_or, ItemType, TaskStatus};
use crate::domain::time::{parse_schedule, to_timestamp};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{task_id}/status", post(update_status))
        .route("/tasks/{task_id}/start", post(start_task))
        .route(
            "/tasks/{task_id}/checklist/generate",
            post(generate_checklist),
        )
        .route("/tasks/{task_id}/checklist/items", post(add_checklist_item))
        .route("/tasks/{task_id}/report.pdf", get(download_report))
}

#[derive(Debug, Deserialize)]
struct TaskListQuery {
    status: Option<String>,
    site: Option<String>,
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    site_id: String,
    title: String,
    scheduled_for: Option<String>,
    status: Option<String>,
    #[serde(default)]
    notes: String,
    plan_id: Option<String>,
    template_id: Option<String>,
    asset_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    notes: Option<String>,
    scheduled_for: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct GenerateChecklistRequest {
    template_id: String,
    asset_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdhocItemRequest {
    label: String,
    item_type: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unit: String,
    asset_id: Option<String>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> AppResult<Json<Vec<TaskRecord>>> {
    let tasks = queries::list_tasks(
        &state.db,
        TaskFilters {
            status: query.status,
            site_id: query.site,
            query: query.q,
        },
    )
    .await?;

    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<TaskRecord>)> {
    let scheduled_for = parse_schedule(
        payload.scheduled_for.as_deref(),
        state.config.timezone,
        Utc::now(),
    );

    let task = queries::create_task(
        &state.db,
        NewTaskInput {
            site_id: payload.site_id,
            title: payload.title,
            scheduled_for: to_timestamp(scheduled_for),
            status: parse_or(payload.status.as_deref(), TaskStatus::parse, TaskStatus::Scheduled),
            notes: payload.notes,
            plan_id: payload.plan_id,
            created_by: actor_from_headers(&headers),
            template_id: payload.template_id,
            asset_id: payload.asset_id,
        },
    )
    .await?;

    tracing::info!(task_id = %task.id, site_id = %task.site_id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Json<TaskDetails>> {
    let details = queries::get_task_details(&state.db, &task_id).await?;
    Ok(Json(details))
}

async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> AppResult<Json<TaskRecord>> {
    if payload.title.is_none() && payload.notes.is_none() && payload.scheduled_for.is_none() {
        return Err(AppError::BadRequest(
            "at least one field must be provided".to_string(),
        ));
    }

    let scheduled_for = payload.scheduled_for.map(|raw| {
        to_timestamp(parse_schedule(Some(&raw), state.config.timezone, Utc::now()))
    });

    let task = queries::update_task(
        &state.db,
        &task_id,
        UpdateTaskInput {
            title: payload.title,
            notes: payload.notes,
            scheduled_for,
        },
    )
    .await?;

    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<StatusCode> {
    let orphaned = queries::delete_task(&state.db, &task_id).await?;
    for key in &orphaned {
        state.files.remove(key).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn update_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<TaskRecord>> {
    let task = queries::update_task_status(&state.db, &task_id, &payload.status).await?;
    Ok(Json(task))
}

async fn start_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Json<TaskRecord>> {
    let task = queries::start_task(&state.db, &task_id).await?;
    Ok(Json(task))
}

async fn generate_checklist(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(payload): Json<GenerateChecklistRequest>,
) -> AppResult<(StatusCode, Json<Vec<ChecklistItem>>)> {
    let items = queries::instantiate_template(
        &state.db,
        &task_id,
        &payload.template_id,
        payload.asset_id.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(items.into_iter().map(ChecklistItem::from).collect()),
    ))
}

async fn add_checklist_item(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(payload): Json<AdhocItemRequest>,
) -> AppResult<(StatusCode, Json<ChecklistItem>)> {
    let item = queries::add_checklist_item(
        &state.db,
        &task_id,
        AdhocItemInput {
            label: payload.label,
            item_type: parse_or(payload.item_type.as_deref(), ItemType::parse, ItemType::YesNo),
            required: payload.required,
            unit: payload.unit,
            asset_id: payload.asset_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ChecklistItem::from(item))))
}

async fn download_report(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Response> {
    let task = queries::get_task(&state.db, &task_id).await?;
    let report_key = task
        .report_key
        .ok_or_else(|| AppError::NotFound(format!("task '{}' has no report yet", task.id)))?;
    let bytes = state.files.get(&report_key).await?;

    Ok(file_response(
        bytes,
        "application/pdf",
        Disposition::Attachment,
        &format!("task-{}-report.pdf", task.id),
    ))
}
