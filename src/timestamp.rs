use chrono::{DateTime, SecondsFormat, Utc};

/// ISO-8601 UTC with microseconds and a trailing `Z`, used as the history sort key.
///
/// Fixed width, so lexical order matches time order.
pub fn utc_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
