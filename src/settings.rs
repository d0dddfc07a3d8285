use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_json::Value;

/// Durable key-value flags. Absent keys read as `false`.
pub trait SettingsStore: Send + Sync {
    fn get_bool(&self, key: &str) -> bool;
    fn set_bool(&self, key: &str, value: bool) -> Result<()>;
}

/// Settings kept as a flat JSON object on disk.
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Value>>,
}

impl FileSettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<BTreeMap<String, Value>>(&json) {
                Ok(values) => values,
                Err(err) => {
                    warn!("settings file {} is unreadable, starting empty: {err}", path.display());
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no settings at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read settings failed: {}", path.display()))
            }
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create settings dir failed: {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(values)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("write temp settings failed: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "rename temp settings failed: {} -> {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        debug!("saved settings to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get_bool(&self, key: &str) -> bool {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), Value::Bool(value));
        self.write(&values)
    }
}

/// Process-local settings, lost on exit.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, bool>>,
}

impl SettingsStore for MemorySettingsStore {
    fn get_bool(&self, key: &str) -> bool {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(key).copied().unwrap_or(false)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_false() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::open(dir.path().join("settings.json")).unwrap();
        assert!(!store.get_bool("did_launch_before"));
        assert!(!store.path().exists());
    }

    #[test]
    fn flag_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = FileSettingsStore::open(&path).unwrap();
        store.set_bool("did_launch_before", true).unwrap();
        drop(store);

        let reopened = FileSettingsStore::open(&path).unwrap();
        assert!(reopened.get_bool("did_launch_before"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"theme":"dark","count":3}"#).unwrap();

        let store = FileSettingsStore::open(&path).unwrap();
        assert!(!store.get_bool("theme"));
        store.set_bool("did_launch_before", true).unwrap();

        let json: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["theme"], "dark");
        assert_eq!(json["count"], 3);
        assert_eq!(json["did_launch_before"], true);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        let store = FileSettingsStore::open(&path).unwrap();
        assert!(!store.get_bool("did_launch_before"));
        store.set_bool("did_launch_before", true).unwrap();
        assert!(FileSettingsStore::open(&path).unwrap().get_bool("did_launch_before"));
    }

    #[test]
    fn memory_store_defaults_to_false() {
        let store = MemorySettingsStore::default();
        assert!(!store.get_bool("x"));
        store.set_bool("x", true).unwrap();
        assert!(store.get_bool("x"));
    }
}
