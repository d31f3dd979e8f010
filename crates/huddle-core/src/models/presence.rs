use serde::{Deserialize, Serialize};

/// One live session on the presence roster. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    /// Display name as typed by the user.
    pub session_key: String,
    pub session_id: String,
}

impl PresenceRecord {
    pub fn new(session_key: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            session_id: session_id.into(),
        }
    }

    /// Display names collide case-insensitively.
    pub fn matches(&self, name: &str) -> bool {
        normalize_key(&self.session_key) == normalize_key(name)
    }
}

pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}
