use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::files::{file_response, guess_mime_type, sanitize_filename, Disposition};
use crate::db::models::TaskDetails;
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::workflow::{self, AnswerBatch, Upload};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks/{task_id}/checklist", post(save_checklist))
        .route(
            "/tasks/{task_id}/checklist/{item_id}/attachment",
            get(download_attachment),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnswerField {
    YesNo,
    Number,
    Text,
    Photo,
}

/// Splits `item_<id>_<kind>` into the item id and the answer slot.
fn parse_field_name(name: &str) -> Option<(&str, AnswerField)> {
    let rest = name.strip_prefix("item_")?;
    let (item_id, kind) = rest.rsplit_once('_')?;
    if item_id.is_empty() {
        return None;
    }

    let field = match kind {
        "yesno" => AnswerField::YesNo,
        "number" => AnswerField::Number,
        "text" => AnswerField::Text,
        "photo" => AnswerField::Photo,
        _ => return None,
    };

    Some((item_id, field))
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "on" | "yes")
}

async fn read_batch(state: &AppState, mut multipart: Multipart) -> AppResult<AnswerBatch> {
    let mut batch = AnswerBatch::default();

    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::warn!(error = ?error, "invalid multipart checklist submission");
        AppError::BadRequest("invalid multipart payload".to_string())
    })? {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };

        if name == "close_task" {
            let value = field.text().await.map_err(|error| {
                tracing::warn!(error = ?error, "failed to read close_task field");
                AppError::BadRequest("invalid close_task value".to_string())
            })?;
            batch.close = is_truthy(&value);
            continue;
        }

        let Some((item_id, kind)) = parse_field_name(&name) else {
            continue;
        };
        let item_id = item_id.to_string();

        if kind == AnswerField::Photo {
            let Some(raw_filename) = field.file_name().map(ToOwned::to_owned) else {
                continue;
            };
            let filename = sanitize_filename(&raw_filename);
            let content_type = field
                .content_type()
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| guess_mime_type(&filename));

            let bytes = field.bytes().await.map_err(|error| {
                tracing::warn!(error = ?error, "failed to read checklist photo");
                AppError::BadRequest("invalid file payload".to_string())
            })?;
            if bytes.is_empty() {
                continue;
            }

            let size = u64::try_from(bytes.len()).map_err(|_| {
                AppError::BadRequest("uploaded file is too large to process".to_string())
            })?;
            if size > state.config.max_file_size {
                return Err(AppError::BadRequest(format!(
                    "file exceeds max size of {} bytes",
                    state.config.max_file_size
                )));
            }

            batch.uploads.insert(
                item_id,
                Upload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                },
            );
            continue;
        }

        let value = field.text().await.map_err(|error| {
            tracing::warn!(error = ?error, "failed to read checklist answer");
            AppError::BadRequest("invalid answer value".to_string())
        })?;
        let submitted = batch.answers.entry(item_id).or_default();
        match kind {
            AnswerField::YesNo => submitted.yesno = Some(value),
            AnswerField::Number => submitted.number = Some(value),
            AnswerField::Text => submitted.text = Some(value),
            AnswerField::Photo => {}
        }
    }

    Ok(batch)
}

async fn save_checklist(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<TaskDetails>> {
    let batch = read_batch(&state, multipart).await?;
    let task = workflow::save_checklist(&state, &task_id, batch).await?;
    let details = queries::get_task_details(&state.db, &task.id).await?;
    Ok(Json(details))
}

async fn download_attachment(
    State(state): State<AppState>,
    Path((task_id, item_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let item = queries::get_checklist_item(&state.db, &task_id, &item_id).await?;
    let answer = item.answer();
    let attachment = answer
        .attachment()
        .ok_or_else(|| AppError::NotFound(format!("checklist item '{item_id}' has no photo")))?;
    let bytes = state.files.get(&attachment.key).await?;

    Ok(file_response(
        bytes,
        &attachment.content_type,
        Disposition::Attachment,
        &attachment.filename,
    ))
}
