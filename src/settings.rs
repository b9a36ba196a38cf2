use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

pub const SETTINGS_ENV: &str = "REFUP_SETTINGS";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSettings {
    #[serde(default)]
    pub directory: String,
    // Base names with the trailing underscore (`widget_`).
    #[serde(default)]
    pub files_to_update: Vec<String>,
}

impl SceneSettings {
    pub fn is_ready(&self) -> bool {
        !self.directory.trim().is_empty()
    }

    pub fn directory_path(&self) -> PathBuf {
        PathBuf::from(self.directory.trim())
    }

    pub fn wants_auto_update(&self, base: &str) -> bool {
        let trimmed = base.trim_end_matches('_');
        self.files_to_update
            .iter()
            .any(|entry| entry == base || entry.trim_end_matches('_') == trimmed)
    }

    pub fn enable_auto_update(&mut self, base: &str) {
        if !self.wants_auto_update(base) {
            self.files_to_update.push(base.to_string());
        }
    }

    pub fn disable_auto_update(&mut self, base: &str) {
        let trimmed = base.trim_end_matches('_');
        self.files_to_update
            .retain(|entry| entry.trim_end_matches('_') != trimmed);
    }
}

pub trait SettingsStore {
    fn load(&self, scene: &SceneId) -> Result<SceneSettings>;

    fn save(&self, scene: &SceneId, settings: &SceneSettings) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    // $REFUP_SETTINGS, else <data dir>/refup/settings.json
    pub fn open_default() -> Result<Self> {
        if let Some(path) = std::env::var_os(SETTINGS_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::new(PathBuf::from(path)));
        }
        Ok(Self::new(base_data_dir()?.join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Unreadable or corrupt files load as empty; the next save rewrites them.
    fn read_all(&self) -> BTreeMap<String, SceneSettings> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %err, "settings unreadable");
                }
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(all) => all,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "settings file corrupt");
                BTreeMap::new()
            }
        }
    }

    fn write_all(&self, all: &BTreeMap<String, SceneSettings>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("create settings dir")?;
        }
        let raw = serde_json::to_string_pretty(all).context("serialize settings")?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, raw).context("write settings temp")?;
        fs::rename(&temp, &self.path).context("finalize settings")?;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self, scene: &SceneId) -> Result<SceneSettings> {
        Ok(self
            .read_all()
            .remove(scene.as_str())
            .unwrap_or_default())
    }

    fn save(&self, scene: &SceneId, settings: &SceneSettings) -> Result<()> {
        let mut all = self.read_all();
        all.insert(scene.as_str().to_string(), settings.clone());
        self.write_all(&all)?;
        debug!(scene = %scene, path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    scenes: RefCell<BTreeMap<SceneId, SceneSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self, scene: &SceneId) -> Result<SceneSettings> {
        Ok(self.scenes.borrow().get(scene).cloned().unwrap_or_default())
    }

    fn save(&self, scene: &SceneId, settings: &SceneSettings) -> Result<()> {
        self.scenes
            .borrow_mut()
            .insert(scene.clone(), settings.clone());
        Ok(())
    }
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("refup"))
}
