use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// # Status Message
///
/// Heartbeat sent to viewers so the "last checked" display stays live even
/// when the ticket list does not change.
///
/// ```json
/// {"type":"status","lastApiCheck":"2024-05-01T13:00:00Z","isActive":true}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    #[serde(rename = "type")]
    pub kind: String,
    /// RFC 3339 time of the last successful poll.
    pub last_api_check: String,
    /// Whether the current hour is inside the active-hours window.
    pub is_active: bool,
}

impl StatusMessage {
    /// Builds the heartbeat. A missing poll time is reported as
    /// `0001-01-01T00:00:00Z`, which the dashboard shows as "never".
    pub fn new(last_success: Option<DateTime<Utc>>, is_active: bool) -> Self {
        let last = last_success.unwrap_or_else(never_polled);
        Self {
            kind: "status".to_string(),
            last_api_check: last.to_rfc3339_opts(SecondsFormat::Secs, true),
            is_active,
        }
    }
}

fn never_polled() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
