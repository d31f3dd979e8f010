//! Record id generation.
//!
//! Ids are the creation time in milliseconds followed by a random suffix, so
//! they sort roughly by creation and two ids minted in the same millisecond by
//! concurrent local actions still differ.

use uuid::Uuid;

const SUFFIX_LEN: usize = 8;

pub fn generate_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(SUFFIX_LEN).collect();
    format!("{}{}", millis, suffix)
}

/// Today's date as stored in `created_at` / `due_date` columns.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Current instant as an RFC 3339 timestamp (chat and suggestion rows).
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
