use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{read_json_file, NotesError, Result};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Directory holding notes, accounts, session and preferences
    pub data_dir: PathBuf,

    /// Quiet period before the visible note list is recomputed (milliseconds)
    pub projection_debounce_ms: u64,

    /// Quiet period after the last keystroke before an edit is saved (milliseconds)
    pub autosave_debounce_ms: u64,

    /// Title given to notes saved without one
    pub untitled_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl Config {
    /// Default settings rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            projection_debounce_ms: 200,
            autosave_debounce_ms: 1200,
            untitled_title: "Untitled".to_string(),
        }
    }

    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, `config.json` inside the
    /// default data directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let config: Config =
                    read_json_file(path)?.ok_or_else(|| NotesError::ConfigError {
                        message: format!("Config file not found: {}", path.display()),
                    })?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                let defaults = Config::default();
                let candidate = defaults.data_dir.join("config.json");
                match read_json_file(&candidate)? {
                    Some(config) => {
                        info!("Loaded configuration from {}", candidate.display());
                        Ok(config)
                    }
                    None => {
                        debug!("No config file found, using defaults");
                        Ok(defaults)
                    }
                }
            }
        }
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.data_dir.join("notes")
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn projection_debounce(&self) -> Duration {
        Duration::from_millis(self.projection_debounce_ms)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

// Falls back to a local directory when the platform offers no data dir
fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "champox", "pocketnotes")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".pocketnotes"))
}
