use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::Reactive;
use crate::error::ClientResult;

pub const DEFAULT_MODULE_ORDER: [&str; 6] = ["finance", "energy", "todo", "calendar", "diet", "sleep"];

/// Dashboard modules: which are shown and in what order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    pub enabled: BTreeMap<String, bool>,
    pub order: Vec<String>,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_MODULE_ORDER
                .iter()
                .map(|k| (k.to_string(), true))
                .collect(),
            order: DEFAULT_MODULE_ORDER.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl ModuleSettings {
    /// Unknown modules count as disabled.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.enabled.get(key).copied().unwrap_or(false)
    }

    /// Enabled modules in display order.
    pub fn visible(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|k| self.is_enabled(k))
            .map(String::as_str)
            .collect()
    }
}

/// File-backed module settings. Every change is written straight to disk.
#[derive(Clone)]
pub struct ModulePreferences {
    path: PathBuf,
    settings: Arc<Reactive<ModuleSettings>>,
}

impl ModulePreferences {
    /// `<data dir>/personal-manager/modules.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("personal-manager").join("modules.json"))
    }

    /// Reads `path`; a missing or unreadable file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable module settings {}: {}", path.display(), e);
                ModuleSettings::default()
            }),
            Err(_) => ModuleSettings::default(),
        };
        Self {
            path,
            settings: Arc::new(Reactive::new(settings)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> ModuleSettings {
        self.settings.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModuleSettings> {
        self.settings.subscribe()
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.settings.read(|s| s.is_enabled(key))
    }

    /// Flips `key` and returns its new visibility.
    pub fn toggle(&self, key: &str) -> ClientResult<bool> {
        let mut now = false;
        self.settings.update(|s| {
            now = !s.is_enabled(key);
            s.enabled.insert(key.to_string(), now);
        });
        self.persist()?;
        Ok(now)
    }

    pub fn enable(&self, key: &str) -> ClientResult<()> {
        self.set(key, true)
    }

    pub fn disable(&self, key: &str) -> ClientResult<()> {
        self.set(key, false)
    }

    pub fn set_order(&self, order: Vec<String>) -> ClientResult<()> {
        self.settings.update(|s| s.order = order);
        self.persist()
    }

    fn set(&self, key: &str, enabled: bool) -> ClientResult<()> {
        self.settings
            .update(|s| {
                s.enabled.insert(key.to_string(), enabled);
            });
        self.persist()
    }

    fn persist(&self) -> ClientResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = self.settings.read(serde_json::to_string_pretty)?;
        fs::write(&self.path, json)?;
        log::debug!("Module settings saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_file_is_missing_or_corrupt() {
        let dir = tempdir().unwrap();
        let prefs = ModulePreferences::load(dir.path().join("modules.json"));
        assert_eq!(prefs.settings(), ModuleSettings::default());
        assert_eq!(prefs.settings().visible(), DEFAULT_MODULE_ORDER.to_vec());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(ModulePreferences::load(&corrupt).settings(), ModuleSettings::default());
    }

    #[test]
    fn changes_survive_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("modules.json");
        let prefs = ModulePreferences::load(&path);

        assert!(!prefs.toggle("energy").unwrap());
        assert!(prefs.toggle("books").unwrap());
        prefs.disable("diet").unwrap();
        prefs
            .set_order(vec!["todo".into(), "books".into(), "finance".into()])
            .unwrap();

        let reloaded = ModulePreferences::load(&path).settings();
        assert!(!reloaded.is_enabled("energy"));
        assert!(reloaded.is_enabled("books"));
        assert!(!reloaded.is_enabled("diet"));
        assert_eq!(reloaded.visible(), vec!["todo", "books", "finance"]);
    }

    #[test]
    fn partial_file_keeps_default_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modules.json");
        fs::write(&path, r#"{ "enabled": { "finance": false } }"#).unwrap();
        let settings = ModulePreferences::load(&path).settings();
        assert!(!settings.is_enabled("finance"));
        assert!(!settings.is_enabled("todo"));
        assert_eq!(settings.order.len(), DEFAULT_MODULE_ORDER.len());
    }
}
