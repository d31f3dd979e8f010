use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{text, Collection, Row, WireEntity};
use crate::constants::fields;

/// A calendar entry, bucketed by `date_key` (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub date_key: String,
    pub name: String,
    pub description: String,
    pub added_by: String,
}

impl CalendarEvent {
    pub fn new(date_key: impl Into<String>, name: impl Into<String>, added_by: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            date_key: date_key.into(),
            name: name.into(),
            description: String::new(),
            added_by: added_by.into(),
        }
    }
}

impl WireEntity for CalendarEvent {
    const COLLECTION: Collection = Collection::CalendarEvents;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn group_key(&self) -> String {
        self.date_key.clone()
    }

    fn to_wire(&self) -> Row {
        let mut row = Row::new();
        row.insert(fields::ID.into(), Value::String(self.id.clone()));
        row.insert("date_key".into(), Value::String(self.date_key.clone()));
        row.insert("name".into(), Value::String(self.name.clone()));
        row.insert("description".into(), Value::String(self.description.clone()));
        row.insert("added_by".into(), Value::String(self.added_by.clone()));
        row
    }

    fn from_wire(row: &Row) -> Self {
        Self {
            id: text(row, fields::ID),
            date_key: text(row, "date_key"),
            name: text(row, "name"),
            description: text(row, "description"),
            added_by: text(row, "added_by"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_groups_by_date_key() {
        let row = json!({"id": "e1", "date_key": "2026-04-10", "name": "Regional", "added_by": "kayden"})
            .as_object()
            .cloned()
            .unwrap();
        let event = CalendarEvent::from_wire(&row);
        assert_eq!(event.group_key(), "2026-04-10");
        assert_eq!(event.description, "");
    }
}
