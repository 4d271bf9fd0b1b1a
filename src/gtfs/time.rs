use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Reference day that bare `HH:MM:SS` values are anchored on.
pub fn service_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Parses a GTFS `HH:MM:SS` time as a time of day on [`service_day`].
///
/// Returns `None` for anything that is not a valid time of day, including
/// the past-midnight hours (`25:10:00`) GTFS allows.
pub fn parse_gtfs_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .ok()
        .map(|t| service_day().and_time(t))
}
