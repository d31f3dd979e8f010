//! Optimistic writes.
//!
//! Every mutation is applied to the local view first and then sent to the
//! remote store. If the store call fails the local change is undone and
//! `CoreError::WriteFailed` is returned; nothing is retried here. Confirmed
//! writes are acknowledged to the merger so their feed echoes cannot undo a
//! newer local edit.
//!
//! Store borrows are never held across an await: the feed can be pumped
//! while a write is in flight. Each write is registered with the merger for
//! as long as it is in flight.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::codec::{changed_columns, flag, Collection, Row, WireEntity};
use crate::constants::{fields, is_system_board};
use crate::error::{CoreError, CoreResult};
use crate::ids::generate_id;
use crate::models::{Board, Task};
use crate::reconcile::ReconciliationMerger;
use crate::remote::{ChangeOp, Filter, RemoteStore};
use crate::store::{SharedStore, StoredEntity};

pub struct OptimisticMutator {
    remote: Rc<dyn RemoteStore>,
    store: SharedStore,
    merger: Rc<RefCell<ReconciliationMerger>>,
}

impl OptimisticMutator {
    pub fn new(
        remote: Rc<dyn RemoteStore>,
        store: SharedStore,
        merger: Rc<RefCell<ReconciliationMerger>>,
    ) -> Self {
        Self { remote, store, merger }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Show `entity` immediately, then insert it remotely. A fresh id is
    /// assigned when the entity has none.
    pub async fn create<E: StoredEntity>(&self, entity: E) -> CoreResult<E> {
        let mut created = self.create_many(vec![entity]).await?;
        created
            .pop()
            .ok_or_else(|| CoreError::InvalidInput("nothing to create".to_string()))
    }

    /// Show every entity immediately, then insert them all in one remote
    /// call. Either all of them stay or, on failure, none do.
    ///
    /// An id that is already held is refused before anything changes.
    pub async fn create_many<E: StoredEntity>(&self, mut entities: Vec<E>) -> CoreResult<Vec<E>> {
        let collection = E::COLLECTION;
        if entities.is_empty() {
            return Ok(entities);
        }
        for entity in &mut entities {
            if entity.id().is_empty() {
                entity.set_id(generate_id());
            }
        }

        let rows: Vec<Row> = {
            let mut store = self.store.borrow_mut();
            let slot = store.collection_mut::<E>();
            if let Some(held) = entities.iter().find(|e| slot.contains(e.id())) {
                return Err(CoreError::InvalidInput(format!(
                    "{} {} already exists",
                    collection,
                    held.id()
                )));
            }
            for entity in &entities {
                slot.upsert(&entity.group_key(), entity.clone());
            }
            entities.iter().map(WireEntity::to_wire).collect()
        };

        self.begin_writes(collection, entities.iter().map(|e| e.id()));
        let result = self.remote.insert(collection, rows.clone()).await;
        self.finish_writes(collection, entities.iter().map(|e| e.id()));

        match result {
            Ok(()) => {
                let mut merger = self.merger.borrow_mut();
                for row in &rows {
                    merger.acknowledge(collection, ChangeOp::Insert, row);
                }
                debug!(%collection, count = entities.len(), "create confirmed");
                Ok(entities)
            }
            Err(err) => {
                {
                    let mut store = self.store.borrow_mut();
                    let slot = store.collection_mut::<E>();
                    for entity in &entities {
                        slot.remove_any(entity.id());
                    }
                }
                warn!(%collection, count = entities.len(), error = %err, "create failed, rolled back");
                Err(CoreError::write_failed(collection, ChangeOp::Insert, err))
            }
        }
    }

    fn begin_writes<'a>(&self, collection: Collection, ids: impl Iterator<Item = &'a str>) {
        let mut merger = self.merger.borrow_mut();
        for id in ids {
            merger.begin_write(collection, id);
        }
    }

    fn finish_writes<'a>(&self, collection: Collection, ids: impl Iterator<Item = &'a str>) {
        let mut merger = self.merger.borrow_mut();
        for id in ids {
            merger.finish_write(collection, id);
        }
    }

    /// Edit a held entity. Only the columns the edit changed are sent; an
    /// edit that changes nothing is not sent at all.
    pub async fn update<E, F>(&self, id: &str, edit: F) -> CoreResult<E>
    where
        E: StoredEntity,
        F: FnOnce(&mut E),
    {
        let (current, patch) = {
            let store = self.store.borrow();
            let current = store
                .collection::<E>()
                .get_by_id(id)
                .cloned()
                .ok_or_else(|| not_found(E::COLLECTION, id))?;
            let mut edited = current.clone();
            edit(&mut edited);
            edited.set_id(id.to_string());
            let patch = changed_columns(&current.to_wire(), &edited.to_wire());
            (current, patch)
        };

        if patch.is_empty() {
            debug!(collection = %E::COLLECTION, id, "update changes nothing");
            return Ok(current);
        }
        self.patch::<E>(id, patch).await
    }

    /// Overwrite the given columns of a held entity and send exactly those
    /// columns to the store, even if they already hold the same values.
    /// A board's `permanent` flag cannot be changed.
    pub async fn patch<E: StoredEntity>(&self, id: &str, mut patch: Row) -> CoreResult<E> {
        let collection = E::COLLECTION;
        patch.remove(fields::ID);

        let (before, updated) = {
            let mut store = self.store.borrow_mut();
            let slot = store.collection_mut::<E>();
            let current = slot
                .get_by_id(id)
                .ok_or_else(|| not_found(collection, id))?;
            let before = current.to_wire();
            let mut row = before.clone();
            for (key, value) in &patch {
                row.insert(key.clone(), value.clone());
            }
            if collection == Collection::Boards
                && flag(&row, Board::PERMANENT) != flag(&before, Board::PERMANENT)
            {
                return Err(CoreError::InvalidInput(format!(
                    "permanence of board {} is fixed at creation",
                    id
                )));
            }
            let updated = E::from_wire(&row);
            slot.upsert(&updated.group_key(), updated.clone());
            (before, updated)
        };

        self.merger.borrow_mut().begin_write(collection, id);
        let result = self
            .remote
            .update(collection, patch.clone(), Filter::id(id))
            .await;
        self.merger.borrow_mut().finish_write(collection, id);

        match result {
            Ok(matched) if matched > 0 => {
                self.merger
                    .borrow_mut()
                    .acknowledge(collection, ChangeOp::Update, &updated.to_wire());
                debug!(%collection, id, columns = patch.len(), "update confirmed");
                Ok(updated)
            }
            Ok(_) => {
                self.restore_columns::<E>(id, &before, &patch);
                warn!(%collection, id, "update matched no rows, rolled back");
                Err(CoreError::write_failed(collection, ChangeOp::Update, "no matching row"))
            }
            Err(err) => {
                self.restore_columns::<E>(id, &before, &patch);
                warn!(%collection, id, error = %err, "update failed, rolled back");
                Err(CoreError::write_failed(collection, ChangeOp::Update, err))
            }
        }
    }

    /// Put back the pre-update value of each patched column, leaving any
    /// other column as it is now.
    fn restore_columns<E: StoredEntity>(&self, id: &str, before: &Row, patch: &Row) {
        let mut store = self.store.borrow_mut();
        let slot = store.collection_mut::<E>();
        let Some(current) = slot.get_by_id(id) else {
            return;
        };
        let mut row = current.to_wire();
        for key in patch.keys() {
            if let Some(value) = before.get(key) {
                row.insert(key.clone(), value.clone());
            }
        }
        let restored = E::from_wire(&row);
        slot.upsert(&restored.group_key(), restored);
    }

    /// Hide the entity immediately, then delete it remotely. On failure it
    /// is put back where it was.
    pub async fn delete<E: StoredEntity>(&self, id: &str) -> CoreResult<()> {
        let collection = E::COLLECTION;
        let (parent, position, removed) = self
            .store
            .borrow_mut()
            .collection_mut::<E>()
            .remove_any(id)
            .ok_or_else(|| not_found(collection, id))?;

        self.merger.borrow_mut().begin_write(collection, id);
        let result = self.remote.delete(collection, Filter::id(id)).await;
        self.merger.borrow_mut().finish_write(collection, id);

        match result {
            Ok(count) => {
                self.merger
                    .borrow_mut()
                    .acknowledge(collection, ChangeOp::Delete, &removed.to_wire());
                debug!(%collection, id, count, "delete confirmed");
                Ok(())
            }
            Err(err) => {
                self.reinsert(&parent, position, removed);
                warn!(%collection, id, error = %err, "delete failed, rolled back");
                Err(CoreError::write_failed(collection, ChangeOp::Delete, err))
            }
        }
    }

    fn reinsert<E: StoredEntity>(&self, parent: &str, position: usize, entity: E) {
        if self.merger.borrow().is_deleted(E::COLLECTION, entity.id()) {
            return;
        }
        let mut store = self.store.borrow_mut();
        let slot = store.collection_mut::<E>();
        if !slot.contains(entity.id()) {
            slot.insert_at(parent, position, entity);
        }
    }

    /// Delete a user board together with its tasks.
    ///
    /// Board and tasks disappear locally in one step. Remotely the tasks go
    /// first so no task is ever left pointing at a missing board; if either
    /// call fails, whatever was not confirmed deleted is restored locally.
    pub async fn delete_board(&self, id: &str) -> CoreResult<Board> {
        if is_system_board(id) {
            return Err(CoreError::ProtectedBoard { id: id.to_string() });
        }

        let (board_slot, tasks) = {
            let mut store = self.store.borrow_mut();
            let board = store
                .board(id)
                .ok_or_else(|| not_found(Collection::Boards, id))?;
            if board.permanent {
                return Err(CoreError::ProtectedBoard { id: id.to_string() });
            }
            let board_slot = store
                .boards
                .remove_any(id)
                .ok_or_else(|| not_found(Collection::Boards, id))?;
            let tasks = store.tasks.remove_group(id);
            (board_slot, tasks)
        };
        let (parent, position, board) = board_slot;

        self.merger.borrow_mut().begin_write(Collection::Boards, id);
        self.begin_writes(Collection::Tasks, tasks.iter().map(|t| t.id.as_str()));
        let result = self.cascade_delete(id, parent, position, board, &tasks).await;
        self.finish_writes(Collection::Tasks, tasks.iter().map(|t| t.id.as_str()));
        self.merger.borrow_mut().finish_write(Collection::Boards, id);
        result
    }

    async fn cascade_delete(
        &self,
        id: &str,
        parent: String,
        position: usize,
        board: Board,
        tasks: &[Task],
    ) -> CoreResult<Board> {
        if let Err(err) = self
            .remote
            .delete(Collection::Tasks, Filter::eq(fields::BOARD_ID, id))
            .await
        {
            self.reinsert(&parent, position, board);
            self.restore_tasks(id, tasks.to_vec());
            warn!(board_id = id, error = %err, "deleting board tasks failed, rolled back");
            return Err(CoreError::write_failed(Collection::Tasks, ChangeOp::Delete, err));
        }

        {
            let mut merger = self.merger.borrow_mut();
            for task in tasks {
                merger.acknowledge(Collection::Tasks, ChangeOp::Delete, &task.to_wire());
            }
        }

        if let Err(err) = self
            .remote
            .delete(Collection::Boards, Filter::id(id))
            .await
        {
            self.reinsert(&parent, position, board);
            warn!(board_id = id, error = %err, "deleting board failed, rolled back");
            return Err(CoreError::write_failed(Collection::Boards, ChangeOp::Delete, err));
        }

        self.merger
            .borrow_mut()
            .acknowledge(Collection::Boards, ChangeOp::Delete, &board.to_wire());
        info!(board_id = id, tasks = tasks.len(), "board deleted");
        Ok(board)
    }

    fn restore_tasks(&self, board_id: &str, tasks: Vec<Task>) {
        let merger = self.merger.borrow();
        let mut store = self.store.borrow_mut();
        for task in tasks {
            if !merger.is_deleted(Collection::Tasks, &task.id) && !store.tasks.contains(&task.id) {
                store.tasks.upsert(board_id, task);
            }
        }
    }
}

fn not_found(collection: Collection, id: &str) -> CoreError {
    CoreError::NotFound {
        collection,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ROOT_GROUP;
    use crate::models::{Message, TaskStatus};
    use crate::remote::{MemoryRemote, RemoteCall};
    use crate::store::AppDataStore;
    use serde_json::json;

    fn setup() -> (MemoryRemote, OptimisticMutator) {
        let remote = MemoryRemote::new();
        let mutator = OptimisticMutator::new(
            Rc::new(remote.clone()),
            Rc::new(RefCell::new(AppDataStore::new())),
            Rc::new(RefCell::new(ReconciliationMerger::new())),
        );
        (remote, mutator)
    }

    async fn seeded_board(mutator: &OptimisticMutator, name: &str) -> Board {
        mutator.create(Board::new(name)).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_is_visible_before_confirmation() {
        let (remote, mutator) = setup();
        let mut pending = Box::pin(mutator.create(Message::new("sam", "hello")));
        assert!(futures::poll!(&mut pending).is_pending());
        assert_eq!(mutator.store().borrow().messages().len(), 1);
        assert!(remote.rows(Collection::Messages).is_empty());

        let message = pending.await.unwrap();
        assert!(!message.id.is_empty());
        assert_eq!(remote.rows(Collection::Messages).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back() {
        let (remote, mutator) = setup();
        remote.fail_next(Collection::Messages, ChangeOp::Insert, 1);

        let err = mutator.create(Message::new("sam", "hello")).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::WriteFailed { collection: Collection::Messages, operation: ChangeOp::Insert, .. }
        ));
        assert!(mutator.store().borrow().messages().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_held_id_keeps_original() {
        let (remote, mutator) = setup();
        let board = seeded_board(&mutator, "Mechanical").await;
        let mut original = Task::new(&board.id, "Original");
        original.id = "t1".to_string();
        mutator.create(original).await.unwrap();
        let before = mutator.store().borrow().clone();
        let writes = remote.write_count();

        let mut copy = Task::new(&board.id, "Copy");
        copy.id = "t1".to_string();
        let err = mutator.create(copy).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert_eq!(*mutator.store().borrow(), before);
        assert_eq!(remote.write_count(), writes);
        assert_eq!(remote.rows(Collection::Tasks).len(), 1);
    }

    #[tokio::test]
    async fn test_create_many_is_all_or_nothing() {
        let (remote, mutator) = setup();
        let board = seeded_board(&mutator, "Mechanical").await;
        remote.fail_next(Collection::Tasks, ChangeOp::Insert, 1);

        let batch = vec![Task::new(&board.id, "a"), Task::new(&board.id, "b")];
        let mut pending = Box::pin(mutator.create_many(batch));
        assert!(futures::poll!(&mut pending).is_pending());
        assert_eq!(mutator.store().borrow().tasks_for_board(&board.id).len(), 2);

        assert!(pending.await.is_err());
        assert!(mutator.store().borrow().tasks.is_empty());
        assert!(remote.rows(Collection::Tasks).is_empty());

        let created = mutator
            .create_many(vec![Task::new(&board.id, "a"), Task::new(&board.id, "b")])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(remote.rows(Collection::Tasks).len(), 2);
        let inserts = remote
            .calls()
            .iter()
            .filter(|c| **c == RemoteCall::Insert(Collection::Tasks))
            .count();
        assert_eq!(inserts, 2);
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_columns() {
        let (remote, mutator) = setup();
        let board = seeded_board(&mutator, "Mechanical").await;
        let task = mutator.create(Task::new(&board.id, "Wire motor")).await.unwrap();

        let updated: Task = mutator
            .update(&task.id, |t: &mut Task| t.assignee = "ana".to_string())
            .await
            .unwrap();
        assert_eq!(updated.assignee, "ana");
        let stored = remote.rows(Collection::Tasks);
        assert_eq!(stored[0].get("assignee"), Some(&json!("ana")));
        assert_eq!(stored[0].get("title"), Some(&json!("Wire motor")));
    }

    #[tokio::test]
    async fn test_noop_update_makes_no_call() {
        let (remote, mutator) = setup();
        let board = seeded_board(&mutator, "Mechanical").await;
        let task = mutator.create(Task::new(&board.id, "Wire motor")).await.unwrap();
        let writes = remote.write_count();

        mutator.update(&task.id, |_: &mut Task| {}).await.unwrap();
        assert_eq!(remote.write_count(), writes);
    }

    #[tokio::test]
    async fn test_failed_update_restores_patched_columns() {
        let (remote, mutator) = setup();
        let board = seeded_board(&mutator, "Mechanical").await;
        let task = mutator.create(Task::new(&board.id, "Wire motor")).await.unwrap();
        remote.fail_next(Collection::Tasks, ChangeOp::Update, 1);

        let mut pending = Box::pin(mutator.update(&task.id, |t: &mut Task| t.status = TaskStatus::Done));
        assert!(futures::poll!(&mut pending).is_pending());
        assert_eq!(
            mutator.store().borrow().tasks.get_by_id(&task.id).map(|t| t.status),
            Some(TaskStatus::Done)
        );
        // A concurrent local edit to another column survives the rollback
        let mut edited = mutator.store().borrow().tasks.get_by_id(&task.id).cloned().unwrap();
        edited.description = "edited meanwhile".to_string();
        mutator.store().borrow_mut().tasks.upsert(&board.id, edited);

        let err = pending.await.unwrap_err();
        assert!(err.is_retryable());
        let store = mutator.store().borrow();
        let restored = store.tasks.get_by_id(&task.id).unwrap();
        assert_eq!(restored.status, TaskStatus::Todo);
        assert_eq!(restored.description, "edited meanwhile");
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let (_remote, mutator) = setup();
        let err = mutator
            .update("missing", |t: &mut Task| t.status = TaskStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_failed_delete_restores_position() {
        let (remote, mutator) = setup();
        let first = mutator.create(Message::new("sam", "one")).await.unwrap();
        let second = mutator.create(Message::new("sam", "two")).await.unwrap();
        mutator.create(Message::new("sam", "three")).await.unwrap();
        remote.fail_next(Collection::Messages, ChangeOp::Delete, 1);

        assert!(mutator.delete::<Message>(&second.id).await.is_err());
        let store = mutator.store().borrow();
        let ids: Vec<&str> = store.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids[0], first.id);
        assert_eq!(ids[1], second.id);
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_board_cascades() {
        let (remote, mutator) = setup();
        let board = seeded_board(&mutator, "Mechanical").await;
        let keep = seeded_board(&mutator, "Business").await;
        mutator.create(Task::new(&board.id, "a")).await.unwrap();
        mutator.create(Task::new(&board.id, "b")).await.unwrap();
        mutator.create(Task::new(&keep.id, "c")).await.unwrap();

        mutator.delete_board(&board.id).await.unwrap();

        let store = mutator.store().borrow();
        assert!(!store.has_board(&board.id));
        assert!(store.tasks.get(&board.id).is_empty());
        assert_eq!(store.tasks.len(), 1);
        assert_eq!(remote.rows(Collection::Tasks).len(), 1);
        assert_eq!(remote.rows(Collection::Boards).len(), 1);

        let calls = remote.calls();
        let tasks_delete = calls.iter().position(|c| *c == RemoteCall::Delete(Collection::Tasks));
        let board_delete = calls.iter().position(|c| *c == RemoteCall::Delete(Collection::Boards));
        assert!(tasks_delete < board_delete);
    }

    #[tokio::test]
    async fn test_delete_board_failure_restores_board_and_tasks() {
        let (remote, mutator) = setup();
        let board = seeded_board(&mutator, "Mechanical").await;
        mutator.create(Task::new(&board.id, "a")).await.unwrap();
        remote.fail_next(Collection::Tasks, ChangeOp::Delete, 1);

        assert!(mutator.delete_board(&board.id).await.is_err());
        let store = mutator.store().borrow();
        assert!(store.has_board(&board.id));
        assert_eq!(store.tasks_for_board(&board.id).len(), 1);
    }

    #[tokio::test]
    async fn test_board_permanence_cannot_be_changed() {
        let (remote, mutator) = setup();
        let mut board = Board::new("Outreach");
        board.permanent = true;
        let board = mutator.create(board).await.unwrap();
        let writes = remote.write_count();

        let err = mutator
            .update(&board.id, |b: &mut Board| b.permanent = false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert_eq!(remote.write_count(), writes);
        assert!(mutator.store().borrow().board(&board.id).unwrap().permanent);
        assert!(matches!(
            mutator.delete_board(&board.id).await,
            Err(CoreError::ProtectedBoard { .. })
        ));

        // Renaming a permanent board is still allowed
        let renamed: Board = mutator
            .update(&board.id, |b: &mut Board| b.name = "Outreach 2026".to_string())
            .await
            .unwrap();
        assert!(renamed.permanent);
    }

    #[tokio::test]
    async fn test_protected_boards_are_refused() {
        let (remote, mutator) = setup();
        let err = mutator.delete_board("scouting").await.unwrap_err();
        assert!(matches!(err, CoreError::ProtectedBoard { .. }));

        let mut permanent = Board::new("Outreach");
        permanent.permanent = true;
        let permanent = mutator.create(permanent).await.unwrap();
        let writes = remote.write_count();
        assert!(matches!(
            mutator.delete_board(&permanent.id).await,
            Err(CoreError::ProtectedBoard { .. })
        ));
        assert_eq!(remote.write_count(), writes);
        assert_eq!(mutator.store().borrow().boards.get(ROOT_GROUP).len(), 1);
    }
}
