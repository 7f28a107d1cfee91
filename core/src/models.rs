mod branch;
mod level;

pub use branch::{validate_title, Branch, BranchDraft, BranchId, BranchPatch, BranchRecord, MIN_TITLE_LEN};
pub use level::Level;

use chrono::{DateTime, Utc};

/// Convert Unix timestamp (seconds) to DateTime<Utc>
pub fn timestamp_to_datetime(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp, 0).unwrap_or_default()
}

/// Convert DateTime<Utc> to Unix timestamp (seconds)
pub fn datetime_to_timestamp(datetime: &DateTime<Utc>) -> i64 {
    datetime.timestamp()
}
