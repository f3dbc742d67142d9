use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::watch;

use crate::{read_json_file, write_json_atomic, NotesError, Result};

/// Appearance preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl<'de> Deserialize<'de> for ThemeMode {
    // Anything unrecognised reads as SYSTEM
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "LIGHT" => ThemeMode::Light,
            "DARK" => ThemeMode::Dark,
            _ => ThemeMode::System,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct Preferences {
    theme_mode: ThemeMode,
    filter_visible: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme_mode: ThemeMode::System,
            filter_visible: true,
        }
    }
}

/// Durable user preferences with a live theme channel.
pub struct PreferenceStore {
    path: PathBuf,
    current: Mutex<Preferences>,
    theme_tx: watch::Sender<ThemeMode>,
}

impl PreferenceStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current: Preferences = read_json_file(&path)?.unwrap_or_default();
        let (theme_tx, _) = watch::channel(current.theme_mode);
        Ok(Self {
            path,
            current: Mutex::new(current),
            theme_tx,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Preferences>> {
        self.current
            .lock()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on preferences".to_string(),
            })
    }

    pub fn theme_mode(&self) -> ThemeMode {
        *self.theme_tx.borrow()
    }

    pub fn observe_theme_mode(&self) -> watch::Receiver<ThemeMode> {
        self.theme_tx.subscribe()
    }

    /// Persists the mode, then publishes it to observers
    pub fn set_theme_mode(&self, mode: ThemeMode) -> Result<()> {
        {
            let mut prefs = self.lock()?;
            let mut updated = prefs.clone();
            updated.theme_mode = mode;
            write_json_atomic(&self.path, &updated)?;
            *prefs = updated;
        }
        self.theme_tx.send_replace(mode);
        info!("Theme mode set to {:?}", mode);
        Ok(())
    }

    pub fn filter_visible(&self) -> Result<bool> {
        Ok(self.lock()?.filter_visible)
    }

    pub fn set_filter_visible(&self, visible: bool) -> Result<()> {
        let mut prefs = self.lock()?;
        let mut updated = prefs.clone();
        updated.filter_visible = visible;
        write_json_atomic(&self.path, &updated)?;
        *prefs = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let prefs = PreferenceStore::open(dir.path().join("preferences.json")).unwrap();
        assert_eq!(prefs.theme_mode(), ThemeMode::System);
        assert!(prefs.filter_visible().unwrap());
    }

    #[test]
    fn test_theme_persists_and_notifies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        let prefs = PreferenceStore::open(&path).unwrap();
        let mut rx = prefs.observe_theme_mode();

        prefs.set_theme_mode(ThemeMode::Dark).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ThemeMode::Dark);

        prefs.set_filter_visible(false).unwrap();
        let reopened = PreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.theme_mode(), ThemeMode::Dark);
        assert!(!reopened.filter_visible().unwrap());
    }

    #[test]
    fn test_unknown_theme_reads_as_system() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{ "theme_mode": "SEPIA" }"#).unwrap();
        let prefs = PreferenceStore::open(&path).unwrap();
        assert_eq!(prefs.theme_mode(), ThemeMode::System);
    }
}
