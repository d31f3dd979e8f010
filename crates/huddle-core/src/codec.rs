//! Wire codec: the only place entities are turned into store rows and back.
//!
//! Rows are flat JSON objects with snake_case column names. Decoding is total:
//! absent or mistyped columns fall back to the documented defaults (empty
//! string for text, empty list for skills, `todo` for status) instead of
//! failing, so a half-migrated row never poisons the local view.
//!
//! List-valued fields travel as a single `;`-joined string. Values that
//! themselves contain `;` do not survive a round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::constants::SKILLS_DELIMITER;

/// One store row.
pub type Row = Map<String, Value>;

/// Named collections exposed by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Boards,
    Tasks,
    Messages,
    CalendarEvents,
    Suggestions,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Boards,
        Collection::Tasks,
        Collection::Messages,
        Collection::CalendarEvents,
        Collection::Suggestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Boards => "boards",
            Collection::Tasks => "tasks",
            Collection::Messages => "messages",
            Collection::CalendarEvents => "calendar_events",
            Collection::Suggestions => "suggestions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity that can be stored remotely and grouped locally.
pub trait WireEntity: Clone + fmt::Debug {
    const COLLECTION: Collection;

    /// Feed inserts go to the front of the group instead of the back.
    const NEWEST_FIRST: bool = false;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Key of the local group this entity is displayed under.
    fn group_key(&self) -> String;

    fn to_wire(&self) -> Row;

    fn from_wire(row: &Row) -> Self;
}

/// Read a text column, tolerating numbers and missing values.
pub fn text(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub fn flag(row: &Row, key: &str) -> bool {
    match row.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Id column of a raw row, if present and non-empty.
pub fn row_id(row: &Row) -> Option<String> {
    let id = text(row, crate::constants::fields::ID);
    if id.is_empty() { None } else { Some(id) }
}

pub fn join_list(values: &[String]) -> String {
    let mut joined = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            joined.push(SKILLS_DELIMITER);
        }
        joined.push_str(value);
    }
    joined
}

/// Split a delimited list. Rows written by older clients may still carry a
/// JSON array, which is accepted as-is.
pub fn split_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(SKILLS_DELIMITER)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Content hash of a row, used to recognise our own echoed writes.
/// `serde_json::Map` keeps keys sorted, so the encoding is canonical.
pub fn row_digest(row: &Row) -> String {
    let encoded = Value::Object(row.clone()).to_string();
    hex::encode(Sha256::digest(encoded.as_bytes()))
}

/// Columns whose values differ between two rows (keys of `after` only).
pub fn changed_columns(before: &Row, after: &Row) -> Row {
    after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
