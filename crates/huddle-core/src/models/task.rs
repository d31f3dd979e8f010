use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::codec::{join_list, split_list, text, Collection, Row, WireEntity};
use crate::constants::fields;

/// Progress column of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "25")]
    Quarter,
    #[serde(rename = "50")]
    Half,
    #[serde(rename = "75")]
    ThreeQuarters,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    /// Board columns in display order.
    pub const COLUMNS: [TaskStatus; 5] = [
        TaskStatus::Todo,
        TaskStatus::Quarter,
        TaskStatus::Half,
        TaskStatus::ThreeQuarters,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Quarter => "25",
            TaskStatus::Half => "50",
            TaskStatus::ThreeQuarters => "75",
            TaskStatus::Done => "done",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::Quarter => "25%",
            TaskStatus::Half => "50%",
            TaskStatus::ThreeQuarters => "75%",
            TaskStatus::Done => "Done",
        }
    }

    /// Strict parse, for user input.
    pub fn parse(value: &str) -> Option<Self> {
        Self::COLUMNS.into_iter().find(|s| s.as_str() == value.trim())
    }

    /// Lenient parse used when decoding rows: anything unknown is `todo`.
    pub fn from_wire_value(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub board_id: String,
    pub title: String,
    pub description: String,
    pub assignee: String,
    pub due_date: String,
    pub status: TaskStatus,
    pub skills: Vec<String>,
    pub created_at: String,
}

impl Task {
    pub fn new(board_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            board_id: board_id.into(),
            title: title.into(),
            description: String::new(),
            assignee: String::new(),
            due_date: String::new(),
            status: TaskStatus::Todo,
            skills: Vec::new(),
            created_at: crate::ids::today(),
        }
    }

    /// A task is overdue when its due date has passed and it is not done.
    /// Unparseable due dates are never overdue.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.status == TaskStatus::Done || self.due_date.is_empty() {
            return false;
        }
        NaiveDate::parse_from_str(&self.due_date, "%Y-%m-%d")
            .map(|due| due < today)
            .unwrap_or(false)
    }
}

impl WireEntity for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn group_key(&self) -> String {
        self.board_id.clone()
    }

    fn to_wire(&self) -> Row {
        let mut row = Row::new();
        row.insert(fields::ID.into(), Value::String(self.id.clone()));
        row.insert(fields::BOARD_ID.into(), Value::String(self.board_id.clone()));
        row.insert("title".into(), Value::String(self.title.clone()));
        row.insert("description".into(), Value::String(self.description.clone()));
        row.insert("assignee".into(), Value::String(self.assignee.clone()));
        row.insert("due_date".into(), Value::String(self.due_date.clone()));
        row.insert(fields::STATUS.into(), Value::String(self.status.as_str().to_string()));
        row.insert("skills".into(), Value::String(join_list(&self.skills)));
        row.insert(fields::CREATED_AT.into(), Value::String(self.created_at.clone()));
        row
    }

    fn from_wire(row: &Row) -> Self {
        Self {
            id: text(row, fields::ID),
            board_id: text(row, fields::BOARD_ID),
            title: text(row, "title"),
            description: text(row, "description"),
            assignee: text(row, "assignee"),
            due_date: text(row, "due_date"),
            status: TaskStatus::from_wire_value(&text(row, fields::STATUS)),
            skills: split_list(row.get("skills")),
            created_at: text(row, fields::CREATED_AT),
        }
    }
}
