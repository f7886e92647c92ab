//! Small UI preferences that outlive a session (theme, selected model).
//!
//! Entries expire after a time-to-live and are last-write-wins. The store is a
//! trait so the file-backed implementation can be swapped for an in-memory one
//! in tests.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const THEME: &str = "theme";
pub const SELECTED_MODEL: &str = "selected_model";

/// Preferences live for 30 days after their last write
pub const DEFAULT_TTL_DAYS: i64 = 30;

pub fn default_ttl() -> Duration {
    Duration::days(DEFAULT_TTL_DAYS)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPreference {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl UiPreference {
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub trait PreferenceStore: Send {
    /// Current value, or `None` when missing or expired
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: HashMap<String, UiPreference>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|p| !p.is_expired(Utc::now()))
            .map(|p| p.value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(key.to_string(), UiPreference::new(value, ttl));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON file of preferences, rewritten on every change
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    entries: HashMap<String, UiPreference>,
}

impl FilePreferenceStore {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut entries: HashMap<String, UiPreference> = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        let now = Utc::now();
        entries.retain(|_, p| !p.is_expired(now));
        Self { path, entries }
    }

    /// The store in the user's config directory
    pub fn open_default() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        Ok(Self::open(config_dir.join("agentdeck").join("preferences.json")))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn save(&self) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|p| !p.is_expired(Utc::now()))
            .map(|p| p.value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(key.to_string(), UiPreference::new(value, ttl));
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }
}
