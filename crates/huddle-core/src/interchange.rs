//! CSV export and import of tasks.
//!
//! One header row, `title,description,assignee,dueDate,status,skills,createdAt`,
//! with skills joined by `;`. Ids and board ids are not part of the format:
//! import mints fresh ids and places every row on the board given by the
//! caller. Missing columns take the same defaults as the wire codec.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::codec::{join_list, split_list};
use crate::error::CoreResult;
use crate::ids::{generate_id, today};
use crate::models::{Task, TaskStatus};

pub const CSV_HEADER: [&str; 7] = [
    "title",
    "description",
    "assignee",
    "dueDate",
    "status",
    "skills",
    "createdAt",
];

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TaskRecord {
    title: String,
    description: String,
    assignee: String,
    due_date: String,
    status: String,
    skills: String,
    created_at: String,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            assignee: task.assignee.clone(),
            due_date: task.due_date.clone(),
            status: task.status.as_str().to_string(),
            skills: join_list(&task.skills),
            created_at: task.created_at.clone(),
        }
    }
}

impl TaskRecord {
    fn into_task(self, board_id: &str) -> Task {
        let created_at = if self.created_at.is_empty() {
            today()
        } else {
            self.created_at
        };
        Task {
            id: generate_id(),
            board_id: board_id.to_string(),
            title: self.title,
            description: self.description,
            assignee: self.assignee,
            due_date: self.due_date,
            status: TaskStatus::from_wire_value(&self.status),
            skills: split_list(Some(&Value::String(self.skills))),
            created_at,
        }
    }
}

/// Write `tasks` as CSV. The header is written even when there are no rows.
pub fn export_tasks<W: io::Write>(tasks: &[Task], writer: W) -> CoreResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;
    for task in tasks {
        csv_writer.serialize(TaskRecord::from(task))?;
    }
    csv_writer.flush()?;
    debug!(rows = tasks.len(), "exported tasks");
    Ok(())
}

pub fn export_tasks_to_string(tasks: &[Task]) -> CoreResult<String> {
    let mut buffer = Vec::new();
    export_tasks(tasks, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Read tasks from CSV onto `board_id`. Unknown columns (an `id` column
/// included) are ignored; short rows take defaults for what is missing.
pub fn import_tasks<R: io::Read>(reader: R, board_id: &str) -> CoreResult<Vec<Task>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let mut tasks = Vec::new();
    for record in csv_reader.deserialize::<TaskRecord>() {
        tasks.push(record?.into_task(board_id));
    }
    debug!(rows = tasks.len(), board_id, "imported tasks");
    Ok(tasks)
}

pub fn import_tasks_from_str(input: &str, board_id: &str) -> CoreResult<Vec<Task>> {
    import_tasks(input.as_bytes(), board_id)
}
