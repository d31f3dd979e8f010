use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BOARD_ID, DEFAULT_REVIEWERS, MAX_SESSIONS_PER_NAME};
use crate::models::presence::normalize_key;

/// Engine configuration, loadable from a camelCase JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    /// Where client-local state (the active board) is persisted
    #[serde(default = "CoreConfig::default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_max_sessions")]
    pub max_sessions_per_name: usize,

    /// Names that can read the suggestion box
    #[serde(default = "default_reviewers")]
    pub reviewers: Vec<String>,

    /// Names that can edit the calendar
    #[serde(default)]
    pub leads: Vec<String>,

    #[serde(default = "default_board")]
    pub default_board: String,
}

fn default_max_sessions() -> usize {
    MAX_SESSIONS_PER_NAME
}

fn default_reviewers() -> Vec<String> {
    DEFAULT_REVIEWERS.iter().map(|s| s.to_string()).collect()
}

fn default_board() -> String {
    DEFAULT_BOARD_ID.to_string()
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            max_sessions_per_name: default_max_sessions(),
            reviewers: default_reviewers(),
            leads: Vec::new(),
            default_board: default_board(),
        }
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|dir| dir.join("huddle"))
            .unwrap_or_else(|| PathBuf::from("huddle_data"))
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CoreConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize config")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    pub fn roles(&self) -> Roles {
        Roles::new(&self.reviewers, &self.leads)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(Self::default_data_dir())
    }
}

/// Name-based roles. Names compare case-insensitively and are not authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roles {
    reviewers: Vec<String>,
    leads: Vec<String>,
}

impl Roles {
    pub fn new(reviewers: &[String], leads: &[String]) -> Self {
        Self {
            reviewers: reviewers.iter().map(|n| normalize_key(n)).collect(),
            leads: leads.iter().map(|n| normalize_key(n)).collect(),
        }
    }

    pub fn is_reviewer(&self, name: &str) -> bool {
        self.reviewers.contains(&normalize_key(name))
    }

    pub fn is_lead(&self, name: &str) -> bool {
        self.leads.contains(&normalize_key(name))
    }
}

impl Default for Roles {
    fn default() -> Self {
        Self::new(&default_reviewers(), &[])
    }
}
