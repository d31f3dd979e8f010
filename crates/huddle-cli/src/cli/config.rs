use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use huddle_core::CoreConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file.
///
/// Engine settings sit at the top level, next to the CLI's own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(flatten)]
    pub core: CoreConfig,

    /// Clients started by `simulate` when none is given on the command line
    #[serde(default = "default_clients")]
    pub clients: usize,
}

fn default_clients() -> usize {
    2
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            clients: default_clients(),
        }
    }
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize config")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    /// Per-client data directory for simulated sessions.
    pub fn client_dir(&self, index: usize) -> PathBuf {
        self.core.data_dir.join(format!("client-{}", index))
    }
}
