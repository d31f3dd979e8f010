use std::cell::RefCell;
use std::rc::Rc;

use chrono::NaiveDate;
use futures::future::{select_all, FutureExt};
use tracing::{debug, info, warn};

use crate::codec::Collection;
use crate::config::{CoreConfig, Roles};
use crate::constants::is_system_board;
use crate::drag::{BoardContext, DragTransitionController, TransitionOutcome, TransitionRequest};
use crate::error::{CoreError, CoreResult};
use crate::events::CoreEvent;
use crate::interchange;
use crate::local_state::LocalState;
use crate::models::{Board, CalendarEvent, Message, Suggestion, Task};
use crate::mutator::OptimisticMutator;
use crate::presence::{PresenceArbiter, PresenceRoster};
use crate::reconcile::{full_reload, MergeOutcome, ReconciliationMerger};
use crate::remote::{ChangeEvent, EventKinds, RemoteStore, Subscription};
use crate::store::{AppDataStore, SharedStore};

/// Feed kinds each collection is subscribed with. Chat and suggestions are
/// append-only, so their updates are never needed.
pub fn subscription_kinds(collection: Collection) -> EventKinds {
    match collection {
        Collection::Messages | Collection::Suggestions => EventKinds::INSERT_DELETE,
        Collection::Boards | Collection::Tasks | Collection::CalendarEvents => EventKinds::ALL,
    }
}

pub struct CoreRuntime {
    config: CoreConfig,
    roles: Roles,
    remote: Rc<dyn RemoteStore>,
    data_store: SharedStore,
    merger: Rc<RefCell<ReconciliationMerger>>,
    mutator: Rc<OptimisticMutator>,
    drag: DragTransitionController,
    local_state: LocalState,
    subscriptions: Vec<Subscription>,
    // Feeds that dropped and could not be re-established yet
    disconnected: Vec<Collection>,
    pending_events: Vec<CoreEvent>,
}

fn merge_event(
    merger: &mut ReconciliationMerger,
    store: &mut AppDataStore,
    event: &ChangeEvent,
    events: &mut Vec<CoreEvent>,
    reloads: &mut Vec<Collection>,
) {
    match merger.apply(store, event) {
        MergeOutcome::Applied => {
            if let Some(id) = crate::codec::row_id(&event.row) {
                events.push(CoreEvent::Changed {
                    collection: event.collection,
                    op: event.op,
                    id,
                });
            }
        }
        MergeOutcome::Skipped(reason) => {
            debug!(collection = %event.collection, op = %event.op, ?reason, "feed event skipped");
        }
        MergeOutcome::ReloadRequired(collection) => {
            if !reloads.contains(&collection) {
                reloads.push(collection);
            }
        }
    }
}

impl CoreRuntime {
    pub fn new(config: CoreConfig, remote: Rc<dyn RemoteStore>) -> CoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let data_store: SharedStore = Rc::new(RefCell::new(AppDataStore::new()));
        let merger = Rc::new(RefCell::new(ReconciliationMerger::new()));
        let mutator = Rc::new(OptimisticMutator::new(
            remote.clone(),
            data_store.clone(),
            merger.clone(),
        ));
        let drag = DragTransitionController::new(mutator.clone());
        let local_state = LocalState::load(&config.data_dir, &config.default_board);

        Ok(Self {
            roles: config.roles(),
            config,
            remote,
            data_store,
            merger,
            mutator,
            drag,
            local_state,
            subscriptions: Vec::new(),
            disconnected: Vec::new(),
            pending_events: Vec::new(),
        })
    }

    pub fn data_store(&self) -> SharedStore {
        self.data_store.clone()
    }

    pub fn mutator(&self) -> Rc<OptimisticMutator> {
        self.mutator.clone()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn presence_arbiter(&self, roster: Rc<dyn PresenceRoster>) -> PresenceArbiter {
        PresenceArbiter::new(roster, self.config.max_sessions_per_name)
    }

    // ===== Lifecycle =====

    /// Subscribe to every collection, then load the authoritative sets.
    /// Feed events that arrive during the load are merged on the next pump.
    pub async fn start(&mut self) -> CoreResult<Vec<CoreEvent>> {
        for collection in Collection::ALL {
            let subscription = self
                .remote
                .subscribe(collection, subscription_kinds(collection))?;
            self.subscriptions.push(subscription);
        }

        let mut events = Vec::new();
        for scope in [
            Collection::Boards,
            Collection::Messages,
            Collection::CalendarEvents,
            Collection::Suggestions,
        ] {
            full_reload(self.remote.as_ref(), &self.data_store, &self.merger, scope).await?;
            events.extend(Self::reloaded_events(scope));
        }
        self.check_active_board(&mut events)?;
        info!(
            active_board = self.active_board(),
            subscriptions = self.subscriptions.len(),
            "runtime started"
        );
        Ok(events)
    }

    pub fn shutdown(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            self.remote.unsubscribe(subscription);
        }
        self.disconnected.clear();
        debug!("runtime shut down");
    }

    fn reloaded_events(scope: Collection) -> Vec<CoreEvent> {
        match scope {
            Collection::Boards => vec![
                CoreEvent::Reloaded { collection: Collection::Boards },
                CoreEvent::Reloaded { collection: Collection::Tasks },
            ],
            collection => vec![CoreEvent::Reloaded { collection }],
        }
    }

    // ===== Feed processing =====

    /// Merge every feed event already delivered, without waiting.
    pub async fn pump(&mut self) -> CoreResult<Vec<CoreEvent>> {
        self.drain(Vec::new(), Vec::new()).await
    }

    /// Wait until some feed delivers, then merge everything delivered.
    pub async fn next_events(&mut self) -> CoreResult<Vec<CoreEvent>> {
        if self.subscriptions.is_empty() {
            return self.pump().await;
        }

        let (first, _, _) = select_all(
            self.subscriptions
                .iter_mut()
                .map(|subscription| subscription.next().boxed_local()),
        )
        .await;

        let mut events = Vec::new();
        let mut reloads = Vec::new();
        if let Some(event) = first {
            let mut store = self.data_store.borrow_mut();
            let mut merger = self.merger.borrow_mut();
            merge_event(&mut merger, &mut store, &event, &mut events, &mut reloads);
        }
        self.drain(events, reloads).await
    }

    async fn drain(
        &mut self,
        mut events: Vec<CoreEvent>,
        mut reloads: Vec<Collection>,
    ) -> CoreResult<Vec<CoreEvent>> {
        events.append(&mut self.pending_events);
        let mut dropped = Vec::new();

        {
            let mut store = self.data_store.borrow_mut();
            let mut merger = self.merger.borrow_mut();
            for (index, subscription) in self.subscriptions.iter_mut().enumerate() {
                loop {
                    match subscription.try_next() {
                        Ok(event) => {
                            merge_event(&mut merger, &mut store, &event, &mut events, &mut reloads)
                        }
                        Err(false) => break,
                        Err(true) => {
                            dropped.push(index);
                            break;
                        }
                    }
                }
            }
        }

        for index in dropped.into_iter().rev() {
            let subscription = self.subscriptions.remove(index);
            let collection = subscription.collection;
            self.remote.unsubscribe(subscription);
            warn!(%collection, "change feed disconnected");
            events.push(CoreEvent::ChannelDisconnected { collection });
            if !self.disconnected.contains(&collection) {
                self.disconnected.push(collection);
            }
        }

        self.resubscribe(&mut events, &mut reloads);

        // A board reload refetches tasks as well
        if reloads.contains(&Collection::Boards) {
            reloads.retain(|c| *c != Collection::Tasks);
        }
        for scope in reloads {
            full_reload(self.remote.as_ref(), &self.data_store, &self.merger, scope).await?;
            events.extend(Self::reloaded_events(scope));
        }

        self.check_active_board(&mut events)?;
        Ok(events)
    }

    /// Re-establish dropped feeds with the same kinds. A restored feed is
    /// followed by a reload of its collection, since events sent while it
    /// was down are lost.
    fn resubscribe(&mut self, events: &mut Vec<CoreEvent>, reloads: &mut Vec<Collection>) {
        let mut still_down = Vec::new();
        for collection in std::mem::take(&mut self.disconnected) {
            match self.remote.subscribe(collection, subscription_kinds(collection)) {
                Ok(subscription) => {
                    info!(%collection, "change feed resubscribed");
                    self.subscriptions.push(subscription);
                    events.push(CoreEvent::Resubscribed { collection });
                    if !reloads.contains(&collection) {
                        reloads.push(collection);
                    }
                }
                Err(e) => {
                    warn!(%collection, error = %e, "resubscribe failed, will retry");
                    still_down.push(collection);
                }
            }
        }
        self.disconnected = still_down;
    }

    /// Feeds currently down. Events for these may be missed until a pump
    /// manages to resubscribe.
    pub fn disconnected(&self) -> &[Collection] {
        &self.disconnected
    }

    // ===== Active board =====

    pub fn active_board(&self) -> &str {
        self.local_state.active_tab()
    }

    pub fn board_context(&self) -> BoardContext {
        BoardContext::new(self.active_board())
    }

    pub fn switch_board(&mut self, board_id: &str) -> CoreResult<CoreEvent> {
        if !is_system_board(board_id) && !self.data_store.borrow().has_board(board_id) {
            return Err(CoreError::NotFound {
                collection: Collection::Boards,
                id: board_id.to_string(),
            });
        }
        self.local_state.set_active_tab(board_id)?;
        debug!(board_id, "switched board");
        Ok(CoreEvent::ActiveBoardChanged {
            board_id: board_id.to_string(),
        })
    }

    /// Fall back to the default board when the active one no longer exists.
    fn check_active_board(&mut self, events: &mut Vec<CoreEvent>) -> CoreResult<()> {
        let active = self.active_board().to_string();
        if active == self.config.default_board
            || is_system_board(&active)
            || self.data_store.borrow().has_board(&active)
        {
            return Ok(());
        }
        info!(board_id = %active, "active board is gone, resetting");
        let default_board = self.config.default_board.clone();
        self.local_state.set_active_tab(&default_board)?;
        events.push(CoreEvent::ActiveBoardChanged {
            board_id: default_board,
        });
        Ok(())
    }

    // ===== Boards and tasks =====

    pub async fn add_board(&self, name: &str) -> CoreResult<Board> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidInput("board name is empty".to_string()));
        }
        self.mutator.create(Board::new(name)).await
    }

    /// Delete a user board and its tasks. If it was the active board the
    /// selection falls back to the default.
    pub async fn delete_board(&mut self, board_id: &str) -> CoreResult<Board> {
        let board = self.mutator.delete_board(board_id).await?;
        if self.active_board() == board_id {
            let default_board = self.config.default_board.clone();
            self.local_state.set_active_tab(&default_board)?;
            self.pending_events.push(CoreEvent::ActiveBoardChanged {
                board_id: default_board,
            });
        }
        Ok(board)
    }

    /// Create a task. A task without a board lands on the active board.
    pub async fn add_task(&self, mut task: Task) -> CoreResult<Task> {
        self.place_task(&mut task)?;
        self.mutator.create(task).await
    }

    fn place_task(&self, task: &mut Task) -> CoreResult<()> {
        if task.board_id.is_empty() {
            task.board_id = self.active_board().to_string();
        }
        if is_system_board(&task.board_id) {
            return Err(CoreError::InvalidInput(format!(
                "{} cannot hold tasks",
                task.board_id
            )));
        }
        if !self.data_store.borrow().has_board(&task.board_id) {
            return Err(CoreError::NotFound {
                collection: Collection::Boards,
                id: task.board_id.clone(),
            });
        }
        Ok(())
    }

    /// Edit a task's fields. The owning board is kept as it was.
    pub async fn update_task<F>(&self, task_id: &str, edit: F) -> CoreResult<Task>
    where
        F: FnOnce(&mut Task),
    {
        self.mutator
            .update(task_id, |task: &mut Task| {
                let board_id = task.board_id.clone();
                edit(task);
                task.board_id = board_id;
            })
            .await
    }

    pub async fn delete_task(&self, task_id: &str) -> CoreResult<()> {
        self.mutator.delete::<Task>(task_id).await
    }

    /// Drop a card on a column of the active board.
    pub async fn move_task(&self, request: TransitionRequest) -> CoreResult<TransitionOutcome> {
        self.drag.drop_task(&self.board_context(), request).await
    }

    // ===== Chat =====

    pub async fn send_message(&self, sender: &str, content: &str) -> CoreResult<Message> {
        if content.trim().is_empty() {
            return Err(CoreError::InvalidInput("message is empty".to_string()));
        }
        self.mutator.create(Message::new(sender, content)).await
    }

    /// Only the sender may delete a message.
    pub async fn delete_message(&self, actor: &str, message_id: &str) -> CoreResult<()> {
        let sender_matches = {
            let store = self.data_store.borrow();
            let message = store
                .messages
                .get_by_id(message_id)
                .ok_or_else(|| CoreError::NotFound {
                    collection: Collection::Messages,
                    id: message_id.to_string(),
                })?;
            message.is_from(actor)
        };
        if !sender_matches {
            return Err(CoreError::NotPermitted {
                actor: actor.to_string(),
                action: "delete another user's message".to_string(),
            });
        }
        self.mutator.delete::<Message>(message_id).await
    }

    // ===== Calendar =====

    fn require_lead(&self, actor: &str, action: &str) -> CoreResult<()> {
        if self.roles.is_lead(actor) {
            Ok(())
        } else {
            Err(CoreError::NotPermitted {
                actor: actor.to_string(),
                action: action.to_string(),
            })
        }
    }

    pub async fn add_calendar_event(
        &self,
        actor: &str,
        date_key: &str,
        name: &str,
        description: &str,
    ) -> CoreResult<CalendarEvent> {
        self.require_lead(actor, "edit the calendar")?;
        if NaiveDate::parse_from_str(date_key, "%Y-%m-%d").is_err() {
            return Err(CoreError::InvalidInput(format!("bad date {:?}", date_key)));
        }
        if name.trim().is_empty() {
            return Err(CoreError::InvalidInput("event name is empty".to_string()));
        }
        let mut event = CalendarEvent::new(date_key, name.trim(), actor);
        event.description = description.to_string();
        self.mutator.create(event).await
    }

    pub async fn delete_calendar_event(&self, actor: &str, event_id: &str) -> CoreResult<()> {
        self.require_lead(actor, "edit the calendar")?;
        self.mutator.delete::<CalendarEvent>(event_id).await
    }

    // ===== Suggestions =====

    pub async fn submit_suggestion(&self, username: &str, content: &str) -> CoreResult<Suggestion> {
        if content.trim().is_empty() {
            return Err(CoreError::InvalidInput("suggestion is empty".to_string()));
        }
        self.mutator.create(Suggestion::new(username, content)).await
    }

    pub fn visible_suggestions(&self, viewer: &str) -> Vec<Suggestion> {
        self.data_store
            .borrow()
            .visible_suggestions(viewer, &self.roles)
            .to_vec()
    }

    // ===== CSV =====

    pub fn export_active_board_csv(&self) -> CoreResult<String> {
        let store = self.data_store.borrow();
        interchange::export_tasks_to_string(store.tasks_for_board(self.active_board()))
    }

    /// Import CSV rows as new tasks on the active board, written in one
    /// batch: either every row is created or none is.
    pub async fn import_csv(&self, input: &str) -> CoreResult<Vec<Task>> {
        let mut tasks = interchange::import_tasks_from_str(input, self.active_board())?;
        for task in &mut tasks {
            self.place_task(task)?;
        }
        let created = self.mutator.create_many(tasks).await?;
        info!(rows = created.len(), board_id = self.active_board(), "csv imported");
        Ok(created)
    }
}

impl Drop for CoreRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireEntity;
    use crate::models::TaskStatus;
    use crate::remote::{ChangeOp, MemoryRemote};

    fn business_board() -> Board {
        Board {
            id: "business".to_string(),
            name: "Business".to_string(),
            permanent: true,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    async fn started(remote: &MemoryRemote, dir: &tempfile::TempDir) -> CoreRuntime {
        let mut config = CoreConfig::new(dir.path());
        config.leads = vec!["Grace".to_string()];
        let mut runtime = CoreRuntime::new(config, Rc::new(remote.clone())).unwrap();
        runtime.start().await.unwrap();
        runtime
    }

    #[tokio::test]
    async fn test_start_loads_and_subscribes() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let runtime = started(&remote, &dir).await;

        assert!(runtime.data_store().borrow().has_board("business"));
        for collection in Collection::ALL {
            assert_eq!(remote.subscriber_count(collection), 1);
        }
        assert_eq!(runtime.active_board(), "business");
    }

    #[tokio::test]
    async fn test_shutdown_unsubscribes() {
        let remote = MemoryRemote::new();
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = started(&remote, &dir).await;
        runtime.shutdown();
        for collection in Collection::ALL {
            assert_eq!(remote.subscriber_count(collection), 0);
        }
    }

    #[tokio::test]
    async fn test_own_echo_does_not_duplicate() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = started(&remote, &dir).await;

        runtime.add_task(Task::new("", "Wire motor")).await.unwrap();
        let events = runtime.pump().await.unwrap();
        assert!(events.is_empty());
        assert_eq!(runtime.data_store().borrow().tasks_for_board("business").len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_resubscribes_and_reloads() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = started(&remote, &dir).await;

        remote.disconnect(Collection::Tasks);
        let mut missed = Task::new("business", "Written while offline");
        missed.id = "t-offline".to_string();
        remote.seed(Collection::Tasks, vec![missed.to_wire()]);

        let events = runtime.pump().await.unwrap();
        assert!(events.contains(&CoreEvent::ChannelDisconnected { collection: Collection::Tasks }));
        assert!(events.contains(&CoreEvent::Resubscribed { collection: Collection::Tasks }));
        assert!(runtime.disconnected().is_empty());
        assert_eq!(remote.subscriber_count(Collection::Tasks), 1);
        assert!(runtime.data_store().borrow().tasks.contains("t-offline"));
    }

    #[tokio::test]
    async fn test_deleting_active_board_resets_selection() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = started(&remote, &dir).await;

        let board = runtime.add_board("Mechanical").await.unwrap();
        runtime.switch_board(&board.id).unwrap();
        runtime.delete_board(&board.id).await.unwrap();

        assert_eq!(runtime.active_board(), "business");
        let events = runtime.pump().await.unwrap();
        assert!(events.contains(&CoreEvent::ActiveBoardChanged { board_id: "business".to_string() }));
    }

    #[tokio::test]
    async fn test_switch_board_persists() {
        let remote = MemoryRemote::new();
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = started(&remote, &dir).await;
        runtime.switch_board("scouting").unwrap();
        assert!(runtime.switch_board("nope").is_err());
        drop(runtime);

        let runtime = started(&remote, &dir).await;
        assert_eq!(runtime.active_board(), "scouting");
    }

    #[tokio::test]
    async fn test_tasks_refused_on_system_and_unknown_boards() {
        let remote = MemoryRemote::new();
        let dir = tempfile::tempdir().unwrap();
        let runtime = started(&remote, &dir).await;
        assert!(matches!(
            runtime.add_task(Task::new("scouting", "x")).await,
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            runtime.add_task(Task::new("ghost", "x")).await,
            Err(CoreError::NotFound { .. })
        ));
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_only_sender_deletes_message() {
        let remote = MemoryRemote::new();
        let dir = tempfile::tempdir().unwrap();
        let runtime = started(&remote, &dir).await;
        let message = runtime.send_message("sam", "hi").await.unwrap();

        assert!(matches!(
            runtime.delete_message("ana", &message.id).await,
            Err(CoreError::NotPermitted { .. })
        ));
        runtime.delete_message("sam", &message.id).await.unwrap();
        assert!(runtime.data_store().borrow().messages().is_empty());
    }

    #[tokio::test]
    async fn test_calendar_requires_lead() {
        let remote = MemoryRemote::new();
        let dir = tempfile::tempdir().unwrap();
        let runtime = started(&remote, &dir).await;

        assert!(matches!(
            runtime.add_calendar_event("sam", "2026-03-01", "Kickoff", "").await,
            Err(CoreError::NotPermitted { .. })
        ));
        assert!(matches!(
            runtime.add_calendar_event("grace", "March 1", "Kickoff", "").await,
            Err(CoreError::InvalidInput(_))
        ));
        let event = runtime
            .add_calendar_event("grace", "2026-03-01", "Kickoff", "all hands")
            .await
            .unwrap();
        assert_eq!(runtime.data_store().borrow().calendar_day("2026-03-01").len(), 1);

        runtime.delete_calendar_event("GRACE", &event.id).await.unwrap();
        assert!(runtime.data_store().borrow().calendar_days().is_empty());
    }

    #[tokio::test]
    async fn test_update_task_keeps_board() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let runtime = started(&remote, &dir).await;
        let task = runtime.add_task(Task::new("", "Wire motor")).await.unwrap();

        let updated = runtime
            .update_task(&task.id, |t| {
                t.board_id = "elsewhere".to_string();
                t.status = TaskStatus::Quarter;
            })
            .await
            .unwrap();
        assert_eq!(updated.board_id, "business");
        assert_eq!(updated.status, TaskStatus::Quarter);
    }

    #[tokio::test]
    async fn test_remote_board_delete_triggers_reload() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = started(&remote, &dir).await;
        let board = runtime.add_board("Mechanical").await.unwrap();
        runtime.pump().await.unwrap();

        // Another client removes the board and its tasks
        remote
            .delete(Collection::Boards, crate::remote::Filter::id(&board.id))
            .await
            .unwrap();
        let events = runtime.pump().await.unwrap();
        assert!(events.contains(&CoreEvent::Reloaded { collection: Collection::Boards }));
        assert!(!runtime.data_store().borrow().has_board(&board.id));
    }

    #[tokio::test]
    async fn test_echo_after_mid_write_reload_is_applied() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = started(&remote, &dir).await;
        let task = runtime.add_task(Task::new("", "Wire motor")).await.unwrap();
        runtime.pump().await.unwrap();

        // The reload lands while the update is still in flight
        remote.disconnect(Collection::Tasks);
        let mutator = runtime.mutator();
        let (pumped, updated) = futures::join!(
            runtime.pump(),
            mutator.update(&task.id, |t: &mut Task| t.status = TaskStatus::Done)
        );
        pumped.unwrap();
        updated.unwrap();
        runtime.pump().await.unwrap();

        let remote_status = remote
            .rows(Collection::Tasks)
            .iter()
            .find(|row| row.get("id") == Some(&serde_json::json!(task.id)))
            .map(|row| Task::from_wire(row).status);
        let local_status = runtime
            .data_store()
            .borrow()
            .tasks
            .get_by_id(&task.id)
            .map(|t| t.status);
        assert_eq!(remote_status, Some(TaskStatus::Done));
        assert_eq!(local_status, remote_status);
    }

    #[tokio::test]
    async fn test_own_board_insert_needs_no_reload() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = started(&remote, &dir).await;

        runtime.add_board("Mechanical").await.unwrap();
        let calls = remote.calls().len();
        let events = runtime.pump().await.unwrap();
        assert!(!events.contains(&CoreEvent::Reloaded { collection: Collection::Boards }));
        assert_eq!(remote.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_failed_csv_import_creates_nothing() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Boards, vec![business_board().to_wire()]);
        let dir = tempfile::tempdir().unwrap();
        let runtime = started(&remote, &dir).await;
        let csv = "title,description,assignee,dueDate,status,skills,createdAt\n\
                   Wire motor,,,,todo,,2026-02-01\n\
                   Order bolts,,,,50,,2026-02-01\n";

        remote.fail_next(Collection::Tasks, ChangeOp::Insert, 1);
        let err = runtime.import_csv(csv).await.unwrap_err();
        assert!(matches!(err, CoreError::WriteFailed { .. }));
        assert!(runtime.data_store().borrow().tasks.is_empty());
        assert!(remote.rows(Collection::Tasks).is_empty());

        let imported = runtime.import_csv(csv).await.unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(remote.rows(Collection::Tasks).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_surfaces_retryable_error() {
        let remote = MemoryRemote::new();
        let dir = tempfile::tempdir().unwrap();
        let runtime = started(&remote, &dir).await;
        remote.fail_next(Collection::Suggestions, ChangeOp::Insert, 1);
        let err = runtime.submit_suggestion("sam", "more snacks").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(runtime.visible_suggestions("kayden").is_empty());
    }
}
