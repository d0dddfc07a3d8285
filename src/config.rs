use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const HOME_ENV: &str = "CROMATICO_HOME";
const CONFIG_FILE: &str = "config.json";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera opened by the desktop backend
    pub camera_index: usize,
    pub preview_width: u32,
    pub preview_height: u32,
    /// Interval of the UI timer that pulls frames
    pub frame_poll_ms: u64,
    /// How often a pending Android permission request is re-checked
    pub permission_poll_ms: u64,
    /// A request whose prompt has not appeared by then was answered by the
    /// system, which happens once the user picked "don't ask again"
    pub permission_prompt_grace_ms: u64,
    /// A permission prompt still open after this long counts as denied
    pub permission_timeout_secs: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            preview_width: 1280,
            preview_height: 720,
            frame_poll_ms: 10,
            permission_poll_ms: 250,
            permission_prompt_grace_ms: 3000,
            permission_timeout_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `config.json` from `dir`, writing the defaults when it does not exist.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            let config = Self::default();
            config.save(&path)?;
            return Ok(config);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("read config failed: {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parse config failed: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("write config failed: {}", path.display()))
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Where config and settings live on desktop builds.
pub fn desktop_data_dir() -> Result<PathBuf> {
    if let Ok(home) = env::var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    dirs::config_dir()
        .map(|dir| dir.join("Cromatico"))
        .ok_or_else(|| anyhow!("no config directory on this platform"))
}

pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"camera_index": 2, "log_level": "debug"}"#).unwrap();

        let config = AppConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config.camera_index, 2);
        assert_eq!(config.preview_width, 1280);
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{").unwrap();
        assert!(AppConfig::load_or_create(dir.path()).is_err());
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let config = AppConfig {
            log_level: "loud".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn settings_live_next_to_config() {
        let path = settings_path(Path::new("/data/app"));
        assert_eq!(path, PathBuf::from("/data/app/settings.json"));
    }
}
