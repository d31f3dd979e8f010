use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::codec::WireEntity;
use crate::config::Roles;
use crate::constants::ROOT_GROUP;
use crate::models::{Board, BoardTab, CalendarEvent, Message, Suggestion, Task, TaskStatus};
use crate::store::EntityStore;

/// Local view of every shared collection - single source of truth for display.
///
/// Written only by the optimistic mutator and the reconciliation merger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppDataStore {
    pub boards: EntityStore<Board>,
    pub tasks: EntityStore<Task>,            // keyed by board id
    pub messages: EntityStore<Message>,
    pub calendar: EntityStore<CalendarEvent>, // keyed by date key
    pub suggestions: EntityStore<Suggestion>,
}

/// Gives generic engine code access to the store slot of an entity type.
pub trait StoredEntity: WireEntity {
    fn slot(store: &AppDataStore) -> &EntityStore<Self>;
    fn slot_mut(store: &mut AppDataStore) -> &mut EntityStore<Self>;
}

macro_rules! stored_entity {
    ($ty:ty, $field:ident) => {
        impl StoredEntity for $ty {
            fn slot(store: &AppDataStore) -> &EntityStore<Self> {
                &store.$field
            }

            fn slot_mut(store: &mut AppDataStore) -> &mut EntityStore<Self> {
                &mut store.$field
            }
        }
    };
}

stored_entity!(Board, boards);
stored_entity!(Task, tasks);
stored_entity!(Message, messages);
stored_entity!(CalendarEvent, calendar);
stored_entity!(Suggestion, suggestions);

/// One user board and the tasks shown under it in the overview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub board: BoardTab,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksOverview {
    pub boards: Vec<BoardSummary>,
    pub total_tasks: usize,
}

impl AppDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection<E: StoredEntity>(&self) -> &EntityStore<E> {
        E::slot(self)
    }

    pub fn collection_mut<E: StoredEntity>(&mut self) -> &mut EntityStore<E> {
        E::slot_mut(self)
    }

    // ===== Boards =====

    /// User boards ordered by creation.
    pub fn user_boards(&self) -> Vec<&Board> {
        let mut boards: Vec<&Board> = self.boards.get(ROOT_GROUP).iter().collect();
        boards.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        boards
    }

    pub fn board(&self, id: &str) -> Option<&Board> {
        self.boards.get_by_id(id)
    }

    pub fn has_board(&self, id: &str) -> bool {
        self.boards.contains(id)
    }

    /// Sidebar entries: the fixed system boards followed by user boards.
    pub fn board_tabs(&self) -> Vec<BoardTab> {
        let mut tabs = BoardTab::system_tabs();
        tabs.extend(self.user_boards().into_iter().map(BoardTab::from));
        tabs
    }

    // ===== Tasks =====

    /// Tasks displayed under a board. A board that is not (or no longer)
    /// known shows nothing, even if tasks referencing it are still held.
    pub fn tasks_for_board(&self, board_id: &str) -> &[Task] {
        if !self.has_board(board_id) {
            let held = self.tasks.get(board_id).len();
            if held > 0 {
                debug!(board_id, held, "omitting orphaned tasks");
            }
            return &[];
        }
        self.tasks.get(board_id)
    }

    pub fn tasks_by_status(&self, board_id: &str, status: TaskStatus) -> Vec<&Task> {
        if !self.has_board(board_id) {
            return Vec::new();
        }
        self.tasks.filter_by_status(board_id, status)
    }

    /// Tasks whose board is not in the local view.
    pub fn orphaned_tasks(&self) -> Vec<&Task> {
        self.tasks
            .groups()
            .filter(|(board_id, _)| !self.has_board(board_id))
            .flat_map(|(_, tasks)| tasks.iter())
            .collect()
    }

    pub fn overdue_tasks(&self, board_id: &str, today: NaiveDate) -> Vec<&Task> {
        self.tasks_for_board(board_id)
            .iter()
            .filter(|task| task.is_overdue(today))
            .collect()
    }

    /// Every user board with its tasks, in sidebar order.
    pub fn tasks_overview(&self) -> TasksOverview {
        let boards: Vec<BoardSummary> = self
            .user_boards()
            .into_iter()
            .map(|board| BoardSummary {
                board: BoardTab::from(board),
                tasks: self.tasks.get(&board.id).to_vec(),
            })
            .collect();
        let total_tasks = boards.iter().map(|b| b.tasks.len()).sum();
        TasksOverview { boards, total_tasks }
    }

    // ===== Chat / calendar / suggestions =====

    pub fn messages(&self) -> &[Message] {
        self.messages.get(ROOT_GROUP)
    }

    pub fn calendar_day(&self, date_key: &str) -> &[CalendarEvent] {
        self.calendar.get(date_key)
    }

    /// Days that currently hold at least one event, ascending.
    pub fn calendar_days(&self) -> Vec<&str> {
        self.calendar.group_keys().collect()
    }

    /// Reviewers read the whole box; everyone else only submits to it.
    pub fn visible_suggestions(&self, viewer: &str, roles: &Roles) -> &[Suggestion] {
        if roles.is_reviewer(viewer) {
            self.suggestions.get(ROOT_GROUP)
        } else {
            &[]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SYSTEM_BOARDS;

    fn board(id: &str, created_at: &str) -> Board {
        Board {
            id: id.to_string(),
            name: id.to_uppercase(),
            permanent: false,
            created_at: created_at.to_string(),
        }
    }

    fn task(id: &str, board_id: &str) -> Task {
        let mut task = Task::new(board_id, id);
        task.id = id.to_string();
        task
    }

    #[test]
    fn test_board_tabs_put_system_boards_first() {
        let mut store = AppDataStore::new();
        store.boards.upsert(ROOT_GROUP, board("late", "2026-02-01"));
        store.boards.upsert(ROOT_GROUP, board("early", "2026-01-01"));

        let tabs = store.board_tabs();
        assert_eq!(tabs.len(), SYSTEM_BOARDS.len() + 2);
        assert!(tabs[..SYSTEM_BOARDS.len()].iter().all(|t| t.system));
        assert_eq!(tabs[SYSTEM_BOARDS.len()].id, "early");
        assert_eq!(tabs[SYSTEM_BOARDS.len() + 1].id, "late");
    }

    #[test]
    fn test_orphaned_tasks_are_not_displayed() {
        let mut store = AppDataStore::new();
        store.boards.upsert(ROOT_GROUP, board("mech", "2026-01-01"));
        store.tasks.upsert("mech", task("t1", "mech"));
        store.tasks.upsert("gone", task("t2", "gone"));

        assert_eq!(store.tasks_for_board("mech").len(), 1);
        assert!(store.tasks_for_board("gone").is_empty());
        assert_eq!(store.orphaned_tasks().len(), 1);
        assert!(store.tasks_by_status("gone", TaskStatus::Todo).is_empty());

        let overview = store.tasks_overview();
        assert_eq!(overview.total_tasks, 1);
        assert_eq!(overview.boards.len(), 1);
    }

    #[test]
    fn test_suggestions_visible_to_reviewers_only() {
        let mut store = AppDataStore::new();
        let mut suggestion = Suggestion::new("sam", "more snacks");
        suggestion.id = "s1".to_string();
        store.suggestions.upsert(ROOT_GROUP, suggestion);

        let roles = Roles::default();
        assert_eq!(store.visible_suggestions("Kayden", &roles).len(), 1);
        assert!(store.visible_suggestions("sam", &roles).is_empty());
    }

    #[test]
    fn test_overdue_tasks() {
        let mut store = AppDataStore::new();
        store.boards.upsert(ROOT_GROUP, board("mech", "2026-01-01"));
        let mut late = task("t1", "mech");
        late.due_date = "2026-01-10".to_string();
        store.tasks.upsert("mech", late);
        store.tasks.upsert("mech", task("t2", "mech"));

        let today = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        let overdue = store.overdue_tasks("mech", today);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, "t1");
    }
}
