use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Which backend receives submitted notes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    #[default]
    Github,
    LocalOrg,
}

fn default_capture_folder() -> String {
    "capture".to_string()
}

fn default_inbox_file() -> String {
    "inbox.org".to_string()
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Settings {
    pub storage_mode: StorageMode,
    /// Root folder the local backend is allowed to touch.
    pub local_folder: Option<PathBuf>,
    /// Best-effort remote backup of local files.
    pub sync_to_github: bool,
    #[serde(default = "default_capture_folder")]
    pub capture_folder: String,
    #[serde(default = "default_inbox_file")]
    pub inbox_file: String,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
    pub username: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::Github,
            local_folder: None,
            sync_to_github: false,
            capture_folder: default_capture_folder(),
            inbox_file: default_inbox_file(),
            repo_owner: None,
            repo_name: None,
            username: None,
        }
    }
}

impl Settings {
    /// Read settings from disk, falling back to defaults when the file does
    /// not exist yet.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| StorageError::Transient(format!("invalid settings file: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::Transient(format!("serialize settings: {e}")))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    pub fn repo(&self) -> Option<(&str, &str)> {
        match (self.repo_owner.as_deref(), self.repo_name.as_deref()) {
            (Some(owner), Some(name)) => Some((owner, name)),
            _ => None,
        }
    }
}

/// Default path of the settings file.
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("jot")
        .join("settings.json")
}

/// Default path of the durable queue database.
pub fn database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("jot")
        .join("jot.db")
}
