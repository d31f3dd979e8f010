use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{text, Collection, Row, WireEntity};
use crate::constants::{fields, ROOT_GROUP};

/// A chat message. `sender` is a free-text display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub created_at: String,
}

impl Message {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            sender: sender.into(),
            content: content.into(),
            created_at: crate::ids::now_timestamp(),
        }
    }

    pub fn is_from(&self, name: &str) -> bool {
        self.sender == name
    }
}

impl WireEntity for Message {
    const COLLECTION: Collection = Collection::Messages;

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
        row.insert("sender".into(), Value::String(self.sender.clone()));
        row.insert("content".into(), Value::String(self.content.clone()));
        row.insert(fields::CREATED_AT.into(), Value::String(self.created_at.clone()));
        row
    }

    fn from_wire(row: &Row) -> Self {
        Self {
            id: text(row, fields::ID),
            sender: text(row, "sender"),
            content: text(row, "content"),
            created_at: text(row, fields::CREATED_AT),
        }
    }
}
