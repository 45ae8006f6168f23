//! Configuration for bsort.
//!
//! Loaded from `--config PATH`, or `<config dir>/brainsort/config.yml`, or
//! `./brainsort.yml`, falling back to defaults. The API key may also come from
//! the `OPENROUTER_API_KEY` environment variable, which wins over the file.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where per-user data files live.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Chat-completions endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used until a user picks their own.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sent as `HTTP-Referer`; OpenRouter uses it for attribution only.
    #[serde(default = "default_referer")]
    pub http_referer: String,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".brainsort")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_referer() -> String {
    "https://github.com/brainsort/brainsort".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_url: default_api_url(),
            api_key: None,
            default_model: default_model(),
            http_referer: default_referer(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("brainsort")
            .join("config.yml")
    }

    /// Load config from file, or use defaults, then apply the environment.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                debug!("using API key from {}", API_KEY_ENV);
                config.api_key = Some(key.trim().to_string());
            }
        }
        Ok(config)
    }

    /// The file `load` reads and `save` should write: the explicit path, else
    /// the first default location that exists, else the user config dir.
    pub fn resolve_path(path: Option<&PathBuf>) -> PathBuf {
        path.cloned()
            .or_else(|| Self::first_existing(&Self::default_paths()))
            .unwrap_or_else(Self::default_path)
    }

    fn default_paths() -> [PathBuf; 2] {
        [Self::default_path(), PathBuf::from("brainsort.yml")]
    }

    fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
        candidates.iter().find(|p| p.exists()).cloned()
    }

    fn load_file(path: Option<&PathBuf>) -> Result<Self> {
        let resolved = Self::resolve_path(path);
        if path.is_some() || resolved.exists() {
            return Self::read(&resolved);
        }
        Ok(Config::default())
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to file, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Store a new API key. Keys that do not look like OpenRouter keys are
    /// accepted with a warning.
    pub fn set_api_key(&mut self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Validation("Please enter an API key".into()));
        }
        if !key.starts_with("sk-or-") {
            warn!("API key doesn't look like an OpenRouter key (expected an 'sk-or-' prefix)");
        }
        self.api_key = Some(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert!(config.data_dir.ends_with(".brainsort"));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "default_model: openai/gpt-4o\ndata_dir: /tmp/bs\n").unwrap();
        let config = Config::read(&path).unwrap();
        assert_eq!(config.default_model, "openai/gpt-4o");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/bs"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_bad_yaml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "data_dir: [unclosed").unwrap();
        assert!(matches!(Config::read(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");
        let mut config = Config::default();
        config.set_api_key("  sk-or-v1-test  ").unwrap();
        config.save(&path).unwrap();
        let back = Config::read(&path).unwrap();
        assert_eq!(back.api_key.as_deref(), Some("sk-or-v1-test"));
    }

    #[test]
    fn test_first_existing_prefers_earlier_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let user_config = dir.path().join("config.yml");
        let local = dir.path().join("brainsort.yml");
        let candidates = [user_config.clone(), local.clone()];
        assert_eq!(Config::first_existing(&candidates), None);

        std::fs::write(&local, "default_model: a/b\n").unwrap();
        assert_eq!(Config::first_existing(&candidates), Some(local));

        std::fs::write(&user_config, "default_model: c/d\n").unwrap();
        assert_eq!(Config::first_existing(&candidates), Some(user_config));
    }

    #[test]
    fn test_save_goes_where_load_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        std::fs::write(&path, "default_model: openai/gpt-4o\n").unwrap();

        let resolved = Config::resolve_path(Some(&path));
        assert_eq!(resolved, path);
        let mut config = Config::load_file(Some(&path)).unwrap();
        config.set_api_key("sk-or-v1-abc").unwrap();
        config.save(&resolved).unwrap();

        let back = Config::read(&path).unwrap();
        assert_eq!(back.default_model, "openai/gpt-4o");
        assert_eq!(back.api_key.as_deref(), Some("sk-or-v1-abc"));
    }

    #[test]
    fn test_set_api_key_rejects_empty() {
        let mut config = Config::default();
        assert!(matches!(config.set_api_key("  "), Err(Error::Validation(_))));
    }
}
