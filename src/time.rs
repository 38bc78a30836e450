use chrono::{DateTime, SecondsFormat, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_date(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// RFC 3339 rendering used by the CLI table view.
pub fn to_rfc3339(ms: i64) -> String {
    to_date(ms).to_rfc3339_opts(SecondsFormat::Secs, true)
}
