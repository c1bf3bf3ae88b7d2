use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

pub fn now_timestamp() -> String {
    to_timestamp(Utc::now())
}

pub fn to_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Interprets a submitted schedule time. Offsets are honoured, naive values are
/// local to `timezone`, and blank or unreadable input means `now`.
pub fn parse_schedule(value: Option<&str>, timezone: Tz, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return now;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        });

    naive
        .and_then(|naive| timezone.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(now)
}

pub fn parse_stored(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// `dd/mm/YYYY HH:MM` in the display timezone, `-` when absent.
pub fn format_for_report(value: Option<&str>, timezone: Tz) -> String {
    value
        .and_then(parse_stored)
        .map(|instant| {
            instant
                .with_timezone(&timezone)
                .format("%d/%m/%Y %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

pub fn parse_date(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use chrono_tz::Europe::Rome;

    use super::{format_for_report, parse_date, parse_schedule};

    #[test]
    fn naive_schedule_is_local_to_configured_timezone() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let parsed = parse_schedule(Some("2024-07-10T09:30"), Rome, now);
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 7, 10, 7, 30, 0).unwrap());
    }

    #[test]
    fn explicit_offsets_win_and_garbage_means_now() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            parse_schedule(Some("2024-03-05T10:00:00+00:00"), Rome, now),
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()
        );
        assert_eq!(parse_schedule(Some("next tuesday"), Rome, now), now);
        assert_eq!(parse_schedule(Some("  "), Rome, now), now);
        assert_eq!(parse_schedule(None, Rome, now), now);
    }

    #[test]
    fn report_format_uses_local_time() {
        assert_eq!(
            format_for_report(Some("2024-12-24T17:05:00Z"), Rome),
            "24/12/2024 18:05"
        );
        assert_eq!(format_for_report(None, Rome), "-");
    }

    #[test]
    fn purchase_dates_are_normalized() {
        assert_eq!(parse_date(Some(" 2023-02-01 ")).as_deref(), Some("2023-02-01"));
        assert_eq!(parse_date(Some("01/02/2023")), None);
    }
}
