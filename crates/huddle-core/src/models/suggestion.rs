use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{text, Collection, Row, WireEntity};
use crate::constants::{fields, ROOT_GROUP};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub username: String,
    pub content: String,
    pub created_at: String,
}

impl Suggestion {
    pub fn new(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            username: username.into(),
            content: content.into(),
            created_at: crate::ids::now_timestamp(),
        }
    }
}

impl WireEntity for Suggestion {
    const COLLECTION: Collection = Collection::Suggestions;
    const NEWEST_FIRST: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn group_key(&self) -> String {
        ROOT_GROUP.to_string()
    }

    fn to_wire(&self) -> Row {
        let mut row = Row::new();
        row.insert(fields::ID.into(), Value::String(self.id.clone()));
        row.insert("username".into(), Value::String(self.username.clone()));
        row.insert("content".into(), Value::String(self.content.clone()));
        row.insert(fields::CREATED_AT.into(), Value::String(self.created_at.clone()));
        row
    }

    fn from_wire(row: &Row) -> Self {
        Self {
            id: text(row, fields::ID),
            username: text(row, "username"),
            content: text(row, "content"),
            created_at: text(row, fields::CREATED_AT),
        }
    }
}
