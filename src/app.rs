use directories::BaseDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ChatError, Result};
use crate::utils::normalize_url;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    #[serde(default)]
    pub socket_url: String,
    pub user_id: String,
    pub token: Option<String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("medihub.toml"))
    }

    /// Read settings from `path`; a missing or broken file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match toml::from_str::<Settings>(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
                    Self::new()
                }
            },
            Err(_) => {
                debug!("No settings at {}", path.display());
                Self::new()
            }
        }
    }

    /// File settings, then `MEDIHUB_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Self {
        let mut settings = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .map(|p| Self::load_from(&p))
            .unwrap_or_default();
        settings.apply_env(|key| env::var(key).ok());
        settings
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MEDIHUB_API_URL") {
            self.api_url = normalize_url(&v);
        }
        if let Some(v) = lookup("MEDIHUB_SOCKET_URL") {
            self.socket_url = v.trim().to_string();
        }
        if let Some(v) = lookup("MEDIHUB_USER_ID") {
            self.user_id = v.trim().to_string();
        }
        if let Some(v) = lookup("MEDIHUB_TOKEN") {
            self.token = Some(v.trim().to_string()).filter(|t| !t.is_empty());
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.api_url.is_empty() && !self.user_id.is_empty()
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))?;
        fs::write(path, toml)?;
        Ok(())
    }

    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .ok_or_else(|| ChatError::Config("No config dir".into()))?;
        self.save_to(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn saved_settings_load_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg/medihub.toml");
        let settings = Settings {
            api_url: "https://api.medihub.test".into(),
            socket_url: "wss://rt.medihub.test".into(),
            user_id: "u1".into(),
            token: Some("t0k".into()),
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn broken_or_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("medihub.toml");
        assert_eq!(Settings::load_from(&path), Settings::new());
        fs::write(&path, "api_url = [").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::new());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut settings = Settings { api_url: "https://old".into(), user_id: "u1".into(), ..Settings::new() };
        settings.apply_env(|key| match key {
            "MEDIHUB_API_URL" => Some("localhost:4000".into()),
            "MEDIHUB_TOKEN" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(settings.api_url, "https://localhost:4000");
        assert_eq!(settings.user_id, "u1");
        assert_eq!(settings.token, None);
        assert!(settings.is_complete());
    }
}
