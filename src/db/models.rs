use serde::Serialize;
use sqlx::FromRow;

use crate::domain::checklist::{AnswerColumns, ChecklistAnswer};
use crate::domain::codes::{ItemType, TaskStatus};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SiteRecord {
    pub id: String,
    pub name: String,
    pub address: String,
    pub notes: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SiteSummary {
    pub id: String,
    pub name: String,
    pub address: String,
    pub notes: String,
    pub created_at: String,
    pub asset_count: i64,
    pub open_task_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssetRecord {
    pub id: String,
    pub site_id: String,
    pub site_name: String,
    pub name: String,
    pub asset_type: String,
    pub serial: String,
    pub vendor: String,
    pub purchase_date: Option<String>,
    pub status: String,
    pub qr_token: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlanRecord {
    pub id: String,
    pub site_id: String,
    pub title: String,
    pub frequency: String,
    pub next_due: Option<String>,
    pub active: i64,
    pub assigned_to: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskRecord {
    pub id: String,
    pub site_id: String,
    pub site_name: String,
    pub plan_id: Option<String>,
    pub title: String,
    pub scheduled_for: String,
    pub status: String,
    pub notes: String,
    pub report_key: Option<String>,
    pub completed_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl TaskRecord {
    pub fn current_status(&self) -> Option<TaskStatus> {
        TaskStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TemplateRecord {
    pub id: String,
    pub site_id: Option<String>,
    pub site_name: Option<String>,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TemplateItemRecord {
    pub id: String,
    pub template_id: String,
    pub seq: i64,
    pub position: i64,
    pub label: String,
    pub item_type: String,
    pub required: i64,
    pub unit: String,
}

impl TemplateItemRecord {
    pub fn item_type(&self) -> ItemType {
        ItemType::parse(&self.item_type).unwrap_or(ItemType::YesNo)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChecklistItemRecord {
    pub id: String,
    pub task_id: String,
    pub seq: i64,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub template_item_id: Option<String>,
    pub label_snapshot: String,
    pub item_type: String,
    pub required: i64,
    pub unit: String,
    pub value_text: String,
    pub value_number: Option<String>,
    pub value_bool: Option<i64>,
    pub attachment_key: Option<String>,
    pub attachment_filename: Option<String>,
    pub attachment_content_type: Option<String>,
}

impl ChecklistItemRecord {
    pub fn item_type(&self) -> ItemType {
        ItemType::parse(&self.item_type).unwrap_or(ItemType::YesNo)
    }

    pub fn answer(&self) -> ChecklistAnswer {
        ChecklistAnswer::from_columns(
            self.item_type(),
            &AnswerColumns {
                value_text: self.value_text.clone(),
                value_number: self.value_number.clone(),
                value_bool: self.value_bool,
                attachment_key: self.attachment_key.clone(),
                attachment_filename: self.attachment_filename.clone(),
                attachment_content_type: self.attachment_content_type.clone(),
            },
        )
    }
}

/// Checklist item as exposed to clients and to the report renderer.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistItem {
    pub id: String,
    pub task_id: String,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub template_item_id: Option<String>,
    pub label: String,
    pub item_type: ItemType,
    pub required: bool,
    pub unit: String,
    pub answer: ChecklistAnswer,
}

impl From<ChecklistItemRecord> for ChecklistItem {
    fn from(record: ChecklistItemRecord) -> Self {
        let item_type = record.item_type();
        let answer = record.answer();
        Self {
            id: record.id,
            task_id: record.task_id,
            asset_id: record.asset_id,
            asset_name: record.asset_name,
            template_item_id: record.template_item_id,
            label: record.label_snapshot,
            item_type,
            required: record.required != 0,
            unit: record.unit,
            answer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateDetails {
    pub template: TemplateRecord,
    pub items: Vec<TemplateItemRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    pub task: TaskRecord,
    pub items: Vec<ChecklistItem>,
    pub related_assets: Vec<AssetRecord>,
    pub available_templates: Vec<TemplateRecord>,
    pub site_assets: Vec<AssetRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteDetails {
    pub site: SiteRecord,
    pub assets: Vec<AssetRecord>,
    pub open_tasks: Vec<TaskRecord>,
    pub recent_done_tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssetChecklistEntry {
    pub id: String,
    pub task_id: String,
    pub task_title: String,
    pub label_snapshot: String,
    pub item_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetOverview {
    pub asset: AssetRecord,
    pub tasks: Vec<TaskRecord>,
    pub checklist_items: Vec<AssetChecklistEntry>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskStats {
    pub total: i64,
    pub scheduled: i64,
    pub in_progress: i64,
    pub done: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub total_assets: i64,
    pub total_sites: i64,
    pub open_tasks: i64,
    pub task_stats: TaskStats,
    pub sites: Vec<SiteSummary>,
    pub upcoming_tasks: Vec<TaskRecord>,
    pub recent_done_tasks: Vec<TaskRecord>,
    pub recent_assets: Vec<AssetRecord>,
}
