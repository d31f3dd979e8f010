//! Application-wide constants
//!
//! Centralized location for identifiers and limits that are shared between
//! the store, the merger and the runtime.

/// Board selected when nothing has been persisted yet, and the fallback after
/// the active board is deleted.
pub const DEFAULT_BOARD_ID: &str = "business";

/// Group key used by collections that have no owning parent (chat, suggestions, boards).
pub const ROOT_GROUP: &str = "_";

/// Maximum concurrent sessions sharing one display name.
pub const MAX_SESSIONS_PER_NAME: usize = 2;

/// Separator for list-valued fields on the wire and in CSV.
pub const SKILLS_DELIMITER: char = ';';

/// Names that may read the suggestion box by default.
pub const DEFAULT_REVIEWERS: &[&str] = &["kayden", "yukti"];

/// Fixed, non-persisted, non-deletable boards shown in front of user boards.
/// (id, display name)
pub const SYSTEM_BOARDS: &[(&str, &str)] = &[
    ("scouting", "Scouting"),
    ("boards", "Boards"),
    ("data", "Data"),
    ("ai-manual", "AI Manual"),
    ("quick-chat", "Quick Chat"),
    ("tasks", "Tasks"),
];

pub fn is_system_board(id: &str) -> bool {
    SYSTEM_BOARDS.iter().any(|(system_id, _)| *system_id == id)
}

// Wire field names shared by several collections
pub mod fields {
    pub const ID: &str = "id";
    pub const BOARD_ID: &str = "board_id";
    pub const CREATED_AT: &str = "created_at";
    pub const STATUS: &str = "status";
}
