use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DbResult;

/// Name of the configuration file looked up in a repository root.
pub const CONFIG_FILE: &str = "folio.toml";

/// Prefix of quarantine branch names.
pub const DEFAULT_CONFLICT_PREFIX: &str = "conflict";

pub const DEFAULT_COMMIT_MESSAGE: &str = "folio commit";

/// Settings of a database view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Branch to open; the repository's HEAD branch when unset.
    pub branch: Option<String>,
    pub conflict_prefix: String,
    pub commit_message: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            branch: None,
            conflict_prefix: DEFAULT_CONFLICT_PREFIX.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }
}

impl DbConfig {
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn from_toml_str(text: &str) -> DbResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> DbResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Read `folio.toml` from `dir`, or use the defaults if there is none.
    pub fn load_or_default(dir: &Path) -> DbResult<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}
