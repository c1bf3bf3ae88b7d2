use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::codes::ItemType;

const NUMBER_SCALE: u32 = 3;
const NUMBER_LIMIT: i64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAttachment {
    #[serde(skip)]
    pub key: String,
    pub filename: String,
    pub content_type: String,
}

/// The one value slot that is meaningful for a checklist item, selected by its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ChecklistAnswer {
    YesNo(Option<bool>),
    Number(Option<Decimal>),
    Text(String),
    Photo(Option<StoredAttachment>),
}

/// Flat storage row for an answer. Columns that do not belong to the item
/// type are always written empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerColumns {
    pub value_text: String,
    pub value_number: Option<String>,
    pub value_bool: Option<i64>,
    pub attachment_key: Option<String>,
    pub attachment_filename: Option<String>,
    pub attachment_content_type: Option<String>,
}

/// Raw form values submitted for one item in an answer batch.
#[derive(Debug, Clone, Default)]
pub struct SubmittedAnswer {
    pub yesno: Option<String>,
    pub number: Option<String>,
    pub text: Option<String>,
}

impl ChecklistAnswer {
    pub fn from_columns(item_type: ItemType, columns: &AnswerColumns) -> Self {
        match item_type {
            ItemType::YesNo => Self::YesNo(columns.value_bool.map(|value| value != 0)),
            ItemType::Number => Self::Number(
                columns
                    .value_number
                    .as_deref()
                    .and_then(|value| Decimal::from_str(value).ok()),
            ),
            ItemType::Text => Self::Text(columns.value_text.clone()),
            ItemType::Photo => Self::Photo(columns.attachment_key.as_ref().map(|key| {
                StoredAttachment {
                    key: key.clone(),
                    filename: columns.attachment_filename.clone().unwrap_or_default(),
                    content_type: columns
                        .attachment_content_type
                        .clone()
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                }
            })),
        }
    }

    pub fn to_columns(&self) -> AnswerColumns {
        let mut columns = AnswerColumns::default();
        match self {
            Self::YesNo(value) => columns.value_bool = value.map(i64::from),
            Self::Number(value) => columns.value_number = value.map(|number| number.to_string()),
            Self::Text(value) => columns.value_text = value.clone(),
            Self::Photo(Some(attachment)) => {
                columns.attachment_key = Some(attachment.key.clone());
                columns.attachment_filename = Some(attachment.filename.clone());
                columns.attachment_content_type = Some(attachment.content_type.clone());
            }
            Self::Photo(None) => {}
        }
        columns
    }

    /// Builds the answer from a batch submission. A photo item without a new
    /// upload keeps whatever attachment it already had.
    pub fn from_submission(
        item_type: ItemType,
        current: &ChecklistAnswer,
        submitted: &SubmittedAnswer,
        upload: Option<StoredAttachment>,
    ) -> Self {
        match item_type {
            ItemType::YesNo => Self::YesNo(parse_yes_no(submitted.yesno.as_deref())),
            ItemType::Number => Self::Number(parse_number(submitted.number.as_deref())),
            ItemType::Text => Self::Text(
                submitted
                    .text
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string(),
            ),
            ItemType::Photo => match (upload, current) {
                (Some(upload), _) => Self::Photo(Some(upload)),
                (None, Self::Photo(existing)) => Self::Photo(existing.clone()),
                (None, _) => Self::Photo(None),
            },
        }
    }

    pub fn attachment(&self) -> Option<&StoredAttachment> {
        match self {
            Self::Photo(attachment) => attachment.as_ref(),
            _ => None,
        }
    }

    /// Human readable answer used in reports.
    pub fn display(&self, unit: &str) -> String {
        match self {
            Self::YesNo(Some(true)) => "SI".to_string(),
            Self::YesNo(Some(false)) => "NO".to_string(),
            Self::Number(Some(value)) if unit.is_empty() => value.to_string(),
            Self::Number(Some(value)) => format!("{value} {unit}"),
            Self::Photo(Some(_)) => "Foto allegata".to_string(),
            Self::Text(value) if !value.is_empty() => value.clone(),
            _ => "-".to_string(),
        }
    }
}

pub fn parse_yes_no(value: Option<&str>) -> Option<bool> {
    match value {
        Some("yes") => Some(true),
        Some("no") => Some(false),
        _ => None,
    }
}

/// Decimal answers hold at most 9 integer and 3 fractional digits. Anything
/// that does not fit, or does not parse, is no answer.
pub fn parse_number(value: Option<&str>) -> Option<Decimal> {
    let raw = value.map(str::trim).filter(|raw| !raw.is_empty())?;
    let parsed = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()?;
    let rounded = parsed.round_dp(NUMBER_SCALE);

    if rounded.abs() >= Decimal::from(NUMBER_LIMIT) {
        return None;
    }

    Some(rounded)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{parse_number, parse_yes_no, ChecklistAnswer, StoredAttachment, SubmittedAnswer};
    use crate::domain::codes::ItemType;

    fn photo(key: &str) -> StoredAttachment {
        StoredAttachment {
            key: key.to_string(),
            filename: "boiler.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
        }
    }

    #[test]
    fn yes_no_only_accepts_exact_words() {
        assert_eq!(parse_yes_no(Some("yes")), Some(true));
        assert_eq!(parse_yes_no(Some("no")), Some(false));
        assert_eq!(parse_yes_no(Some("YES")), None);
        assert_eq!(parse_yes_no(None), None);
    }

    #[test]
    fn numbers_are_lenient() {
        assert_eq!(parse_number(Some(" 2.5 ")), Decimal::from_str("2.5").ok());
        assert_eq!(parse_number(Some("1.23456")), Decimal::from_str("1.235").ok());
        assert_eq!(parse_number(Some("1e3")), Decimal::from_str("1000").ok());
        assert_eq!(parse_number(Some("2,5")), None);
        assert_eq!(parse_number(Some("abc")), None);
        assert_eq!(parse_number(Some("")), None);
        assert_eq!(parse_number(Some("1000000000")), None);
    }

    #[test]
    fn unparsable_number_clears_previous_value() {
        let current = ChecklistAnswer::Number(Decimal::from_str("4.2").ok());
        let submitted = SubmittedAnswer {
            number: Some("four".to_string()),
            ..SubmittedAnswer::default()
        };
        let answer = ChecklistAnswer::from_submission(ItemType::Number, &current, &submitted, None);
        assert_eq!(answer, ChecklistAnswer::Number(None));
    }

    #[test]
    fn photo_without_upload_keeps_existing_attachment() {
        let current = ChecklistAnswer::Photo(Some(photo("attachments/old.jpg")));
        let kept = ChecklistAnswer::from_submission(
            ItemType::Photo,
            &current,
            &SubmittedAnswer::default(),
            None,
        );
        assert_eq!(kept, current);

        let replaced = ChecklistAnswer::from_submission(
            ItemType::Photo,
            &current,
            &SubmittedAnswer::default(),
            Some(photo("attachments/new.jpg")),
        );
        assert_eq!(
            replaced.attachment().map(|attachment| attachment.key.as_str()),
            Some("attachments/new.jpg")
        );
    }

    #[test]
    fn columns_only_populate_the_active_slot() {
        let columns = ChecklistAnswer::Text("  kept verbatim".to_string()).to_columns();
        assert_eq!(columns.value_text, "  kept verbatim");
        assert!(columns.value_number.is_none());
        assert!(columns.value_bool.is_none());
        assert!(columns.attachment_key.is_none());

        let columns = ChecklistAnswer::YesNo(Some(false)).to_columns();
        assert_eq!(columns.value_bool, Some(0));
        assert!(columns.value_text.is_empty());
        assert_eq!(
            ChecklistAnswer::from_columns(ItemType::YesNo, &columns),
            ChecklistAnswer::YesNo(Some(false))
        );
    }

    #[test]
    fn text_submission_is_trimmed() {
        let submitted = SubmittedAnswer {
            text: Some("  filtro sostituito \n".to_string()),
            ..SubmittedAnswer::default()
        };
        let answer = ChecklistAnswer::from_submission(
            ItemType::Text,
            &ChecklistAnswer::Text(String::new()),
            &submitted,
            None,
        );
        assert_eq!(answer, ChecklistAnswer::Text("filtro sostituito".to_string()));
    }

    #[test]
    fn display_matches_report_wording() {
        assert_eq!(ChecklistAnswer::YesNo(Some(true)).display(""), "SI");
        assert_eq!(ChecklistAnswer::YesNo(None).display(""), "-");
        assert_eq!(
            ChecklistAnswer::Number(Decimal::from_str("1.5").ok()).display("bar"),
            "1.5 bar"
        );
        assert_eq!(ChecklistAnswer::Number(None).display("bar"), "-");
        assert_eq!(ChecklistAnswer::Photo(Some(photo("k"))).display(""), "Foto allegata");
        assert_eq!(ChecklistAnswer::Text(String::new()).display(""), "-");
    }
}
