//! Application configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::document::Lang;
use super::draft::FileDraftStore;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Editor settings
    pub editor: EditorConfig,
    /// Draft recovery settings
    pub draft: DraftConfig,
    /// Remote API settings
    pub api: ApiConfig,
}

/// Editor-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period before a draft is written, in milliseconds
    pub autosave_debounce_ms: u64,
    /// Language of the authoring interface
    pub ui_lang: Lang,
    /// Language the preview starts in
    pub preview_lang: Lang,
}

/// Draft recovery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    /// Override for the draft file location
    pub path: Option<PathBuf>,
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the manuals backend
    pub base_url: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 1000,
            ui_lang: Lang::Ar,
            preview_lang: Lang::Ar,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("gov", "manual-editor", "ManualEditor")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Draft store honouring the configured path override
    pub fn draft_store(&self) -> Result<FileDraftStore> {
        match &self.draft.path {
            Some(path) => Ok(FileDraftStore::new(path.clone())),
            None => Ok(FileDraftStore::default_location()?),
        }
    }
}
