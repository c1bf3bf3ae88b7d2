use std::collections::HashMap;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{ChecklistItem, TaskRecord};
use crate::db::queries::{self, AnswerUpdate, TaskClosure};
use crate::domain::checklist::{ChecklistAnswer, StoredAttachment, SubmittedAnswer};
use crate::domain::codes::{ItemType, TaskStatus};
use crate::domain::lifecycle;
use crate::domain::time::to_timestamp;
use crate::error::AppResult;
use crate::report;
use crate::state::AppState;
use crate::storage;

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One submission of the checklist form. Every item of the task is rewritten
/// from it; fields missing for an item clear that item's answer, except
/// photos, which keep their attachment unless a new file is sent.
#[derive(Debug, Clone, Default)]
pub struct AnswerBatch {
    pub answers: HashMap<String, SubmittedAnswer>,
    pub uploads: HashMap<String, Upload>,
    pub close: bool,
}

/// Saves a batch of answers and, when requested, closes the task: the report
/// is rendered from the answers being saved and the task is stored as done
/// together with them.
pub async fn save_checklist(
    state: &AppState,
    task_id: &str,
    batch: AnswerBatch,
) -> AppResult<TaskRecord> {
    let task = queries::get_task(&state.db, task_id).await?;
    let records = queries::list_checklist_items(&state.db, &task.id).await?;

    let mut items = Vec::with_capacity(records.len());
    let mut updates = Vec::with_capacity(records.len());
    let mut written_keys = vec![];
    let mut replaced_keys = vec![];

    for record in records {
        let mut item = ChecklistItem::from(record);
        let submitted = batch.answers.get(&item.id).cloned().unwrap_or_default();

        let upload = match batch.uploads.get(&item.id) {
            Some(upload) if item.item_type == ItemType::Photo => {
                let stored = match store_upload(state, upload).await {
                    Ok(stored) => stored,
                    Err(error) => {
                        discard(state, &written_keys).await;
                        return Err(error);
                    }
                };
                written_keys.push(stored.key.clone());
                Some(stored)
            }
            _ => None,
        };

        let answer = ChecklistAnswer::from_submission(item.item_type, &item.answer, &submitted, upload);
        if let Some(previous) = item.answer.attachment() {
            if answer.attachment().map(|current| &current.key) != Some(&previous.key) {
                replaced_keys.push(previous.key.clone());
            }
        }

        updates.push(AnswerUpdate {
            item_id: item.id.clone(),
            answer: answer.clone(),
        });
        item.answer = answer;
        items.push(item);
    }

    let closure = if batch.close {
        match render_and_store_report(state, &task, &items).await {
            Ok(closure) => {
                written_keys.push(closure.report_key.clone());
                if let Some(previous) = &task.report_key {
                    replaced_keys.push(previous.clone());
                }
                Some(closure)
            }
            Err(error) => {
                discard(state, &written_keys).await;
                return Err(error);
            }
        }
    } else {
        None
    };

    if let Err(error) = queries::save_answers(&state.db, &task.id, &updates, closure.as_ref()).await {
        discard(state, &written_keys).await;
        return Err(error);
    }

    for key in &replaced_keys {
        state.files.remove(key).await;
    }

    if let Some(closure) = &closure {
        info!(
            task_id = %task.id,
            report_key = %closure.report_key,
            items = items.len(),
            "task closed"
        );
    }

    queries::get_task(&state.db, &task.id).await
}

/// Removes files written for a submission that was not committed.
async fn discard(state: &AppState, keys: &[String]) {
    for key in keys {
        state.files.remove(key).await;
    }
}

async fn store_upload(state: &AppState, upload: &Upload) -> AppResult<StoredAttachment> {
    let key = storage::attachment_key(&Uuid::new_v4().to_string(), &upload.filename);
    state.files.put(&key, &upload.bytes).await?;

    Ok(StoredAttachment {
        key,
        filename: upload.filename.clone(),
        content_type: upload.content_type.clone(),
    })
}

async fn render_and_store_report(
    state: &AppState,
    task: &TaskRecord,
    items: &[ChecklistItem],
) -> AppResult<TaskClosure> {
    let now = Utc::now();
    let change = lifecycle::transition(
        task.current_status(),
        task.completed_at.as_deref(),
        TaskStatus::Done,
        &to_timestamp(now),
    );

    let mut closing = task.clone();
    closing.status = change.status.as_str().to_string();
    closing.completed_at = change.completed_at.clone();

    let pdf = report::render_task_report(&closing, items, state.config.timezone, now)?;
    let report_key = storage::report_key(&task.id, &Uuid::new_v4().to_string());
    state.files.put(&report_key, &pdf).await?;

    Ok(TaskClosure {
        status: change.status,
        completed_at: change.completed_at,
        report_key,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use super::{save_checklist, AnswerBatch, Upload};
    use crate::db::queries;
    use crate::db::testing::{new_task, seed_site, setup_state};
    use crate::domain::checklist::{ChecklistAnswer, SubmittedAnswer};
    use crate::domain::codes::ItemType;
    use crate::state::AppState;

    async fn add_item(state: &AppState, task_id: &str, label: &str, item_type: ItemType) -> String {
        queries::add_checklist_item(
            &state.db,
            task_id,
            queries::AdhocItemInput {
                label: label.to_string(),
                item_type,
                required: false,
                unit: if item_type == ItemType::Number {
                    "bar".to_string()
                } else {
                    String::new()
                },
                asset_id: None,
            },
        )
        .await
        .expect("item should be added")
        .id
    }

    fn photo(bytes: &[u8]) -> Upload {
        Upload {
            filename: "targhetta.JPG".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn closing_without_items_still_produces_report() {
        let (_temp_dir, state) = setup_state("close-empty").await;
        let site_id = seed_site(&state.db, "Asilo Nord").await;
        let task = new_task(&state.db, &site_id, "Giro ispettivo").await;

        let closed = save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                close: true,
                ..AnswerBatch::default()
            },
        )
        .await
        .expect("task should close");

        assert_eq!(closed.status, "done");
        assert!(closed.completed_at.is_some());
        let report_key = closed.report_key.expect("report key should be stored");
        assert!(report_key.starts_with(&format!("reports/task-{}-", task.id)));
        assert!(report_key.ends_with(".pdf"));

        let pdf = state.files.get(&report_key).await.expect("report should exist");
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn answers_clear_foreign_slots_and_parse_leniently() {
        let (_temp_dir, state) = setup_state("answers").await;
        let site_id = seed_site(&state.db, "Asilo Nord").await;
        let task = new_task(&state.db, &site_id, "Controllo caldaia").await;
        let pressure = add_item(&state, &task.id, "Pressione", ItemType::Number).await;
        let lamp = add_item(&state, &task.id, "Spia", ItemType::YesNo).await;
        let note = add_item(&state, &task.id, "Osservazioni", ItemType::Text).await;

        let mut answers = HashMap::new();
        answers.insert(
            pressure.clone(),
            SubmittedAnswer {
                yesno: Some("yes".to_string()),
                number: Some(" 1.23456 ".to_string()),
                text: Some("ignored".to_string()),
            },
        );
        answers.insert(
            lamp.clone(),
            SubmittedAnswer {
                yesno: Some("maybe".to_string()),
                ..SubmittedAnswer::default()
            },
        );
        answers.insert(
            note.clone(),
            SubmittedAnswer {
                text: Some("  tutto regolare  ".to_string()),
                ..SubmittedAnswer::default()
            },
        );

        save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                answers,
                ..AnswerBatch::default()
            },
        )
        .await
        .expect("answers should save");

        let pressure_row = queries::get_checklist_item(&state.db, &task.id, &pressure)
            .await
            .expect("pressure item");
        assert_eq!(pressure_row.value_number.as_deref(), Some("1.235"));
        assert!(pressure_row.value_bool.is_none());
        assert_eq!(pressure_row.value_text, "");

        let lamp_row = queries::get_checklist_item(&state.db, &task.id, &lamp)
            .await
            .expect("lamp item");
        assert_eq!(lamp_row.answer(), ChecklistAnswer::YesNo(None));

        let note_row = queries::get_checklist_item(&state.db, &task.id, &note)
            .await
            .expect("note item");
        assert_eq!(note_row.answer(), ChecklistAnswer::Text("tutto regolare".to_string()));

        let task = queries::get_task(&state.db, &task.id).await.expect("task");
        assert_eq!(task.status, "scheduled");
        assert!(task.report_key.is_none());
    }

    #[tokio::test]
    async fn photo_is_kept_until_replaced() {
        let (_temp_dir, state) = setup_state("photo-keep").await;
        let site_id = seed_site(&state.db, "Asilo Nord").await;
        let task = new_task(&state.db, &site_id, "Foto impianto").await;
        let item_id = add_item(&state, &task.id, "Targhetta", ItemType::Photo).await;

        let mut uploads = HashMap::new();
        uploads.insert(item_id.clone(), photo(b"first"));
        save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                uploads,
                ..AnswerBatch::default()
            },
        )
        .await
        .expect("photo should save");

        let first = queries::get_checklist_item(&state.db, &task.id, &item_id)
            .await
            .expect("item");
        let first_key = first.attachment_key.clone().expect("attachment stored");
        assert!(first_key.starts_with("attachments/"));
        assert!(first_key.ends_with(".jpg"));

        save_checklist(&state, &task.id, AnswerBatch::default())
            .await
            .expect("empty batch should save");
        let kept = queries::get_checklist_item(&state.db, &task.id, &item_id)
            .await
            .expect("item");
        assert_eq!(kept.attachment_key.as_deref(), Some(first_key.as_str()));

        let mut uploads = HashMap::new();
        uploads.insert(item_id.clone(), photo(b"second"));
        save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                uploads,
                close: true,
                ..AnswerBatch::default()
            },
        )
        .await
        .expect("replacement should save");

        let replaced = queries::get_checklist_item(&state.db, &task.id, &item_id)
            .await
            .expect("item");
        let second_key = replaced.attachment_key.expect("attachment stored");
        assert_ne!(second_key, first_key);
        assert_eq!(
            state.files.get(&second_key).await.expect("new photo"),
            b"second".to_vec()
        );
        assert!(state.files.get(&first_key).await.is_err());
    }

    #[tokio::test]
    async fn reclosing_keeps_first_completion_time() {
        let (_temp_dir, state) = setup_state("reclose").await;
        let site_id = seed_site(&state.db, "Asilo Nord").await;
        let task = new_task(&state.db, &site_id, "Chiusura doppia").await;

        let first = save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                close: true,
                ..AnswerBatch::default()
            },
        )
        .await
        .expect("first close");
        let second = save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                close: true,
                ..AnswerBatch::default()
            },
        )
        .await
        .expect("second close");

        assert_eq!(first.completed_at, second.completed_at);

        let first_key = first.report_key.expect("first report");
        let second_key = second.report_key.expect("second report");
        assert_ne!(first_key, second_key);
        assert!(state.files.get(&first_key).await.is_err());
        assert!(state.files.get(&second_key).await.is_ok());
    }

    fn stored_reports(root: &Path) -> Vec<String> {
        match std::fs::read_dir(root.join("media/reports")) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => vec![],
        }
    }

    async fn block_task_updates(state: &AppState) {
        sqlx::query(
            "CREATE TRIGGER block_task_updates BEFORE UPDATE ON maintenance_tasks \
             BEGIN SELECT RAISE(ABORT, 'task updates are blocked'); END",
        )
        .execute(&state.db)
        .await
        .expect("trigger should be created");
    }

    #[tokio::test]
    async fn failed_close_leaves_no_files_behind() {
        let (temp_dir, state) = setup_state("close-fails").await;
        let site_id = seed_site(&state.db, "Asilo Nord").await;
        let task = new_task(&state.db, &site_id, "Chiusura bloccata").await;
        let item_id = add_item(&state, &task.id, "Targhetta", ItemType::Photo).await;
        block_task_updates(&state).await;

        let mut uploads = HashMap::new();
        uploads.insert(item_id.clone(), photo(b"jpeg"));
        let result = save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                uploads,
                close: true,
                ..AnswerBatch::default()
            },
        )
        .await;
        assert!(result.is_err());

        let task = queries::get_task(&state.db, &task.id).await.expect("task");
        assert_eq!(task.status, "scheduled");
        assert!(task.report_key.is_none());
        assert!(stored_reports(temp_dir.path()).is_empty());

        let item = queries::get_checklist_item(&state.db, &task.id, &item_id)
            .await
            .expect("item");
        assert!(item.attachment_key.is_none());
        let attachments = std::fs::read_dir(temp_dir.path().join("media/attachments"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(attachments, 0);
    }

    #[tokio::test]
    async fn failed_reclose_keeps_committed_report() {
        let (temp_dir, state) = setup_state("reclose-fails").await;
        let site_id = seed_site(&state.db, "Asilo Nord").await;
        let task = new_task(&state.db, &site_id, "Seconda chiusura").await;
        let note = add_item(&state, &task.id, "Osservazioni", ItemType::Text).await;

        let closed = save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                close: true,
                ..AnswerBatch::default()
            },
        )
        .await
        .expect("first close");
        let report_key = closed.report_key.expect("report key");
        let committed = state.files.get(&report_key).await.expect("report");
        block_task_updates(&state).await;

        let mut answers = HashMap::new();
        answers.insert(
            note.clone(),
            SubmittedAnswer {
                text: Some("mai salvato".to_string()),
                ..SubmittedAnswer::default()
            },
        );
        let result = save_checklist(
            &state,
            &task.id,
            AnswerBatch {
                answers,
                close: true,
                ..AnswerBatch::default()
            },
        )
        .await;
        assert!(result.is_err());

        let task = queries::get_task(&state.db, &task.id).await.expect("task");
        assert_eq!(task.report_key.as_deref(), Some(report_key.as_str()));
        assert_eq!(
            state.files.get(&report_key).await.expect("report kept"),
            committed
        );
        assert_eq!(stored_reports(temp_dir.path()).len(), 1);

        let note_row = queries::get_checklist_item(&state.db, &task.id, &note)
            .await
            .expect("note item");
        assert_eq!(note_row.answer(), ChecklistAnswer::Text(String::new()));
    }
}
