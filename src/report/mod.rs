pub mod label;
pub mod layout;
pub mod pdf;
pub mod qr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::db::models::{ChecklistItem, TaskRecord};
use crate::domain::time::{format_for_report, to_timestamp};
use crate::error::AppResult;
use crate::report::layout::{Layout, Page};

pub const REPORT_TITLE: &str = "Report intervento";
pub const EMPTY_CHECKLIST: &str = "Nessuna voce in checklist.";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportItem {
    pub label: String,
    pub answer: String,
    pub asset_name: Option<String>,
}

/// Everything printed on a task report, already formatted for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportContent {
    pub site_name: String,
    pub title: String,
    pub status_label: String,
    pub scheduled_for: String,
    pub completed_at: String,
    pub generated_at: String,
    pub notes: String,
    pub items: Vec<ReportItem>,
}

impl ReportContent {
    pub fn new(
        task: &TaskRecord,
        items: &[ChecklistItem],
        timezone: Tz,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let status_label = task
            .current_status()
            .map(|status| status.label().to_string())
            .unwrap_or_else(|| task.status.clone());

        Self {
            site_name: task.site_name.clone(),
            title: task.title.clone(),
            status_label,
            scheduled_for: format_for_report(Some(&task.scheduled_for), timezone),
            completed_at: format_for_report(task.completed_at.as_deref(), timezone),
            generated_at: format_for_report(Some(&to_timestamp(generated_at)), timezone),
            notes: task.notes.clone(),
            items: items
                .iter()
                .map(|item| ReportItem {
                    label: item.label.clone(),
                    answer: item.answer.display(&item.unit),
                    asset_name: item.asset_name.clone(),
                })
                .collect(),
        }
    }

    pub fn layout(&self) -> Vec<Page> {
        let mut layout = Layout::new();
        layout.title(REPORT_TITLE);

        layout.section("Dati intervento");
        layout.field("Sede", &self.site_name);
        layout.field("Titolo", &self.title);
        layout.field("Stato", &self.status_label);
        layout.field("Pianificato", &self.scheduled_for);
        layout.field("Data esecuzione", &self.completed_at);
        layout.field("Report generato", &self.generated_at);

        if !self.notes.trim().is_empty() {
            layout.section("Note");
            layout.paragraph(&self.notes);
        }

        layout.section("Checklist");
        if self.items.is_empty() {
            layout.paragraph(EMPTY_CHECKLIST);
        }

        for (index, item) in self.items.iter().enumerate() {
            let mut details = vec![format!("Risposta: {}", item.answer)];
            if let Some(asset_name) = &item.asset_name {
                details.push(format!("Asset: {asset_name}"));
            }
            layout.entry(&format!("{}. {}", index + 1, item.label), &details);
        }

        layout.finish()
    }
}

/// Renders the report for a task in the state it is about to be saved in.
pub fn render_task_report(
    task: &TaskRecord,
    items: &[ChecklistItem],
    timezone: Tz,
    generated_at: DateTime<Utc>,
) -> AppResult<Vec<u8>> {
    let content = ReportContent::new(task, items, timezone, generated_at);
    let title = format!("{REPORT_TITLE} - {}", content.title);
    pdf::render_pages(&title, &content.layout())
}
