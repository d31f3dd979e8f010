//! Dropping a task card onto a status column.

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::codec::Row;
use crate::constants::fields;
use crate::error::{CoreError, CoreResult};
use crate::models::{Task, TaskStatus};
use crate::mutator::OptimisticMutator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl TransitionRequest {
    pub fn new(task_id: impl Into<String>, from: TaskStatus, to: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            from,
            to,
        }
    }

    /// Build a request from raw column ids as they come off a drop target.
    pub fn from_columns(task_id: &str, from: &str, to: &str) -> CoreResult<Self> {
        let parse = |column: &str| {
            TaskStatus::parse(column)
                .ok_or_else(|| CoreError::InvalidInput(format!("unknown status column {:?}", column)))
        };
        Ok(Self::new(task_id, parse(from)?, parse(to)?))
    }
}

/// The board whose columns received the drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardContext {
    pub board_id: String,
}

impl BoardContext {
    pub fn new(board_id: impl Into<String>) -> Self {
        Self {
            board_id: board_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Dropped back on its own column: nothing was written.
    NoOp,
    Moved(Task),
}

pub struct DragTransitionController {
    mutator: Rc<OptimisticMutator>,
}

impl DragTransitionController {
    pub fn new(mutator: Rc<OptimisticMutator>) -> Self {
        Self { mutator }
    }

    /// A drop onto the same column does nothing. Any other drop issues one
    /// update whose patch is the status column alone.
    pub async fn drop_task(
        &self,
        board: &BoardContext,
        request: TransitionRequest,
    ) -> CoreResult<TransitionOutcome> {
        if request.from == request.to {
            debug!(task_id = %request.task_id, status = %request.from, "dropped on same column");
            return Ok(TransitionOutcome::NoOp);
        }

        let on_board = self
            .mutator
            .store()
            .borrow()
            .tasks
            .get(&board.board_id)
            .iter()
            .any(|task| task.id == request.task_id);
        if !on_board {
            return Err(CoreError::InvalidInput(format!(
                "task {} is not on board {}",
                request.task_id, board.board_id
            )));
        }

        let mut patch = Row::new();
        patch.insert(
            fields::STATUS.to_string(),
            Value::String(request.to.as_str().to_string()),
        );
        let task = self.mutator.patch::<Task>(&request.task_id, patch).await?;
        debug!(task_id = %task.id, from = %request.from, to = %request.to, "task moved");
        Ok(TransitionOutcome::Moved(task))
    }
}
