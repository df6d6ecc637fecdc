//! Time helpers.

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a CloudTrail timestamp as ISO-8601 UTC with second precision.
///
/// Returns `None` when the input is not RFC 3339.
pub fn to_utc_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| {
            ts.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        })
}
