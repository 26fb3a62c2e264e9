//! Settings Accessor
//!
//! Persisted settings record with hard-coded defaults. Every stored field is
//! optional and defaults apply per field. Settings are read fresh for every
//! job, so edits take effect on the next request.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use crate::core::request::RequestFormat;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.example.com/furigana";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// How requests reach the annotation service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// A proxy holds the credential; no authorization header is sent
    Proxied,
    /// Requests go straight to the service with a bearer credential
    Direct,
}

/// Effective settings after merging storage over defaults
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_endpoint: String,
    pub api_key: String,
    pub use_proxy: bool,
    pub request_format: RequestFormat,
    pub model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key: String::new(),
            use_proxy: true,
            request_format: RequestFormat::Simple,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a store. Never fails: unreadable storage yields defaults.
    pub fn load(store: &dyn SettingsStore) -> Self {
        match store.read() {
            Ok(Some(stored)) => Self::default().merged(stored),
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("⚠️ Settings unreadable, using defaults: {}", e);
                Self::default()
            }
        }
    }

    fn merged(mut self, stored: StoredSettings) -> Self {
        if let Some(v) = stored.api_endpoint {
            self.api_endpoint = v;
        }
        if let Some(v) = stored.api_key {
            self.api_key = v;
        }
        if let Some(v) = stored.use_proxy {
            self.use_proxy = v;
        }
        if let Some(v) = stored.request_format {
            self.request_format = v;
        }
        if let Some(v) = stored.model {
            self.model = v;
        }
        self
    }

    pub fn transport_mode(&self) -> TransportMode {
        if self.use_proxy {
            TransportMode::Proxied
        } else {
            TransportMode::Direct
        }
    }

    /// Credential with everything but the last four characters hidden
    pub fn masked_api_key(&self) -> String {
        let count = self.api_key.chars().count();
        if count <= 4 {
            return "*".repeat(count);
        }
        let tail: String = self.api_key.chars().skip(count - 4).collect();
        format!("{}{}", "*".repeat(count - 4), tail)
    }
}

/// The persisted record. Absent fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_proxy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_format: Option<RequestFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl StoredSettings {
    /// Overlay the fields set in `update` onto this record, trimming strings
    /// the way the options page does before saving.
    pub fn apply(&mut self, update: StoredSettings) {
        if let Some(v) = update.api_endpoint {
            self.api_endpoint = Some(v.trim().to_string());
        }
        if let Some(v) = update.api_key {
            self.api_key = Some(v.trim().to_string());
        }
        if let Some(v) = update.use_proxy {
            self.use_proxy = Some(v);
        }
        if let Some(v) = update.request_format {
            self.request_format = Some(v);
        }
        if let Some(v) = update.model {
            self.model = Some(v.trim().to_string());
        }
    }
}

/// Key-value storage behind the settings record
pub trait SettingsStore: Send + Sync {
    /// Read the stored record, `None` when nothing was ever saved
    fn read(&self) -> Result<Option<StoredSettings>>;

    /// Replace the stored record
    fn write(&self, stored: &StoredSettings) -> Result<()>;
}

/// Merge `update` into whatever is stored and persist it. Fails without
/// writing when the stored record can't be read.
pub fn save(store: &dyn SettingsStore, update: StoredSettings) -> Result<StoredSettings> {
    let mut stored = store
        .read()
        .context("Existing settings could not be read")?
        .unwrap_or_default();
    stored.apply(update);
    store.write(&stored)?;
    Ok(stored)
}

/// JSON file under the user's config directory
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new(settings_path())
    }
}

impl SettingsStore for FileSettingsStore {
    fn read(&self) -> Result<Option<StoredSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let stored = serde_json::from_str(&content)?;
        Ok(Some(stored))
    }

    fn write(&self, stored: &StoredSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(stored)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-process store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    stored: Mutex<Option<StoredSettings>>,
}

impl MemorySettingsStore {
    pub fn new(stored: StoredSettings) -> Self {
        Self {
            stored: Mutex::new(Some(stored)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn read(&self) -> Result<Option<StoredSettings>> {
        let guard = self
            .stored
            .lock()
            .map_err(|e| anyhow::anyhow!("settings lock poisoned: {}", e))?;
        Ok(guard.clone())
    }

    fn write(&self, stored: &StoredSettings) -> Result<()> {
        let mut guard = self
            .stored
            .lock()
            .map_err(|e| anyhow::anyhow!("settings lock poisoned: {}", e))?;
        *guard = Some(stored.clone());
        Ok(())
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("furigana-maker")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}
