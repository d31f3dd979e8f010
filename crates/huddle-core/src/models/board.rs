use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{flag, text, Collection, Row, WireEntity};
use crate::constants::{fields, ROOT_GROUP, SYSTEM_BOARDS};

/// A user-created board. `permanent` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    pub permanent: bool,
    pub created_at: String,
}

impl Board {
    pub const PERMANENT: &'static str = "permanent";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            permanent: false,
            created_at: crate::ids::now_timestamp(),
        }
    }
}

impl WireEntity for Board {
    const COLLECTION: Collection = Collection::Boards;

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
        row.insert("name".into(), Value::String(self.name.clone()));
        row.insert(Self::PERMANENT.into(), Value::Bool(self.permanent));
        row.insert(fields::CREATED_AT.into(), Value::String(self.created_at.clone()));
        row
    }

    fn from_wire(row: &Row) -> Self {
        Self {
            id: text(row, fields::ID),
            name: text(row, "name"),
            permanent: flag(row, Self::PERMANENT),
            created_at: text(row, fields::CREATED_AT),
        }
    }
}

/// An entry in the board sidebar: either a fixed system board or a user board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardTab {
    pub id: String,
    pub name: String,
    pub system: bool,
    pub permanent: bool,
}

impl BoardTab {
    pub fn system_tabs() -> Vec<BoardTab> {
        SYSTEM_BOARDS
            .iter()
            .map(|(id, name)| BoardTab {
                id: id.to_string(),
                name: name.to_string(),
                system: true,
                permanent: true,
            })
            .collect()
    }

    /// System boards and permanent boards cannot be deleted.
    pub fn is_deletable(&self) -> bool {
        !self.system && !self.permanent
    }
}

impl From<&Board> for BoardTab {
    fn from(board: &Board) -> Self {
        Self {
            id: board.id.clone(),
            name: board.name.clone(),
            system: false,
            permanent: board.permanent,
        }
    }
}
