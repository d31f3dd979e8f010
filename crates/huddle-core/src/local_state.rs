use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreResult;

const FILE_NAME: &str = "local_state.json";

/// Client-local UI state (persisted to JSON file, never shared)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStateData {
    pub active_tab: String,
}

pub struct LocalState {
    path: PathBuf,
    data: LocalStateData,
}

impl LocalState {
    /// Restore from `data_dir`, falling back to `default_board` when the file
    /// is missing or unreadable.
    pub fn load(data_dir: &Path, default_board: &str) -> Self {
        let path = data_dir.join(FILE_NAME);
        let data = Self::load_from_file(&path).unwrap_or_else(|| LocalStateData {
            active_tab: default_board.to_string(),
        });
        Self { path, data }
    }

    fn load_from_file(path: &Path) -> Option<LocalStateData> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read local state");
                return None;
            }
        };
        match serde_json::from_str::<LocalStateData>(&contents) {
            Ok(data) if !data.active_tab.is_empty() => Some(data),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed local state");
                None
            }
        }
    }

    fn save_to_file(&self) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn active_tab(&self) -> &str {
        &self.data.active_tab
    }

    /// Written on every switch, even to the tab already active.
    pub fn set_active_tab(&mut self, tab: &str) -> CoreResult<()> {
        self.data.active_tab = tab.to_string();
        self.save_to_file()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = LocalState::load(dir.path(), "business");
        assert_eq!(state.active_tab(), "business");
        assert!(!state.path().exists());
    }

    #[test]
    fn test_switch_persists_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = LocalState::load(dir.path(), "business");
        state.set_active_tab("mech").unwrap();

        let restored = LocalState::load(dir.path(), "business");
        assert_eq!(restored.active_tab(), "mech");
    }

    #[test]
    fn test_malformed_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FILE_NAME), "{not json").unwrap();
        let state = LocalState::load(dir.path(), "business");
        assert_eq!(state.active_tab(), "business");
    }

    #[test]
    fn test_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut state = LocalState::load(&nested, "business");
        state.set_active_tab("scouting").unwrap();
        assert!(nested.join(FILE_NAME).exists());
    }
}
