//! UI preference persistence.
//!
//! Preferences survive restarts independently of chat history, which is
//! deliberately in-memory only.
use anyhow::{Context, Result};
use mbtichat_core::get_data_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiPrefs {
    pub dark_mode: bool,
}

pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir()?;
        Ok(Self::new(data_dir.join("prefs.json")))
    }

    /// A missing or unreadable file yields the defaults; preferences are
    /// not worth failing startup over.
    pub fn load(&self) -> UiPrefs {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, prefs: &UiPrefs) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(prefs)?;
        fs::write(&self.path, text)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Flips dark mode and persists immediately, returning the new value.
    pub fn toggle_dark_mode(&self) -> Result<bool> {
        let mut prefs = self.load();
        prefs.dark_mode = !prefs.dark_mode;
        self.save(&prefs)?;
        Ok(prefs.dark_mode)
    }
}
