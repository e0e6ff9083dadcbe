//! Persisted viewer settings
//!
//! Everything the viewer remembers lives in a flat string key/value store
//! under the `glbview_` prefix. In the browser that is `localStorage`; native
//! runs and tests use [`FileStore`] or [`MemoryStore`].
//!
//! A [`SettingsBundle`] is the exported form: every persisted key plus the
//! light and theme state, as one JSON document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::camera::{CameraBundle, ControlType};
use crate::lights::{LightRig, LightState};
use crate::reload::{DEFAULT_INTERVAL_MS, MIN_INTERVAL_MS};
use crate::theme::ThemeState;

pub const KEY_PREFIX: &str = "glbview_";
pub const AUTO_RELOAD_KEY: &str = "glbview_auto_reload";
pub const AUTO_RELOAD_INTERVAL_KEY: &str = "glbview_auto_reload_interval_ms";
pub const AXES_VISIBLE_KEY: &str = "glbview_axes_visible";
pub const DEFAULT_CONTROL_TYPE_KEY: &str = "glbview_default_control_type";
pub const CAMERAS_KEY: &str = "glbview_cameras_v1";
pub const THEME_KEY: &str = "glbview_theme";
pub const THEME_CUSTOM_KEY: &str = "glbview_theme_custom";
pub const MODEL_SELECTOR_COLLAPSED_KEY: &str = "glbview_model_selector_collapsed";

/// Current settings bundle format
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Unsupported settings version: {0}")]
    UnsupportedVersion(u32),
}

/// Flat string key/value storage
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError>;
    fn remove(&mut self, key: &str) -> Result<(), SettingsError>;
    fn keys(&self) -> Vec<String>;
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Store backed by a pretty-printed JSON object on disk.
///
/// Every write rewrites the whole file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store, starting empty when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        if self.entries.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Scalar viewer preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerPrefs {
    pub auto_reload: bool,
    pub auto_reload_interval_ms: u32,
    pub axes_visible: bool,
    pub default_control_type: ControlType,
    pub model_selector_collapsed: bool,
}

impl Default for ViewerPrefs {
    fn default() -> Self {
        Self {
            auto_reload: true,
            auto_reload_interval_ms: DEFAULT_INTERVAL_MS,
            axes_visible: true,
            default_control_type: ControlType::Orbit,
            model_selector_collapsed: false,
        }
    }
}

impl ViewerPrefs {
    /// Read preferences; missing or invalid values fall back to defaults
    pub fn load(store: &dyn SettingsStore) -> Self {
        let defaults = Self::default();
        let interval = store
            .get(AUTO_RELOAD_INTERVAL_KEY)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|ms| *ms >= MIN_INTERVAL_MS)
            .unwrap_or(defaults.auto_reload_interval_ms);
        let control_type = store
            .get(DEFAULT_CONTROL_TYPE_KEY)
            .and_then(|v| v.parse::<ControlType>().ok())
            .unwrap_or(defaults.default_control_type);
        Self {
            auto_reload: store.get(AUTO_RELOAD_KEY).as_deref() != Some("false"),
            auto_reload_interval_ms: interval,
            axes_visible: store.get(AXES_VISIBLE_KEY).as_deref() != Some("false"),
            default_control_type: control_type,
            model_selector_collapsed: store.get(MODEL_SELECTOR_COLLAPSED_KEY).as_deref()
                == Some("true"),
        }
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        store.set(AUTO_RELOAD_KEY, &self.auto_reload.to_string())?;
        store.set(AUTO_RELOAD_INTERVAL_KEY, &self.auto_reload_interval_ms.to_string())?;
        store.set(AXES_VISIBLE_KEY, &self.axes_visible.to_string())?;
        store.set(DEFAULT_CONTROL_TYPE_KEY, self.default_control_type.as_str())?;
        store.set(
            MODEL_SELECTOR_COLLAPSED_KEY,
            &self.model_selector_collapsed.to_string(),
        )?;
        Ok(())
    }
}

/// Saved camera slots, or `None` when absent or unreadable
pub fn load_camera_bundle(store: &dyn SettingsStore) -> Option<CameraBundle> {
    let raw = store.get(CAMERAS_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(bundle) => Some(bundle),
        Err(e) => {
            warn!("Ignoring saved cameras: {}", e);
            None
        }
    }
}

pub fn save_camera_bundle(
    store: &mut dyn SettingsStore,
    bundle: &CameraBundle,
) -> Result<(), SettingsError> {
    let json = serde_json::to_string(bundle)?;
    store.set(CAMERAS_KEY, &json)
}

/// Remove every persisted key
pub fn clear_persisted(store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
    for key in store.keys() {
        if key.starts_with(KEY_PREFIX) {
            store.remove(&key)?;
        }
    }
    Ok(())
}

fn default_bundle_version() -> u32 {
    BUNDLE_VERSION
}

/// Exported settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsBundle {
    #[serde(default = "default_bundle_version")]
    pub version: u32,
    #[serde(rename = "localStorage", default)]
    pub local_storage: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lights: Option<LightState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeState>,
}

impl SettingsBundle {
    /// Gather every persisted key together with the light and theme state
    pub fn export(store: &dyn SettingsStore, lights: &LightState, theme: &ThemeState) -> Self {
        let local_storage = store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(KEY_PREFIX))
            .filter_map(|k| store.get(&k).map(|v| (k, v)))
            .collect();
        Self {
            version: BUNDLE_VERSION,
            local_storage,
            lights: Some(lights.clone()),
            theme: Some(theme.clone()),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let bundle: SettingsBundle = serde_json::from_str(text)?;
        if bundle.version > BUNDLE_VERSION {
            return Err(SettingsError::UnsupportedVersion(bundle.version));
        }
        Ok(bundle)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the keys back, then apply lights and theme.
    ///
    /// Keys outside the `glbview_` prefix are skipped. Camera slots and
    /// preferences take effect once the caller reloads them from the store.
    pub fn import(
        &self,
        store: &mut dyn SettingsStore,
        lights: &mut LightRig,
        theme: &mut ThemeState,
    ) -> Result<(), SettingsError> {
        for (key, value) in &self.local_storage {
            if !key.starts_with(KEY_PREFIX) {
                debug!(key = %key, "Skipping foreign settings key");
                continue;
            }
            store.set(key, value)?;
        }
        if let Some(state) = &self.lights {
            lights.apply_state(state);
        }
        if let Some(next) = &self.theme {
            *theme = next.clone();
            theme.save(store)?;
        }
        Ok(())
    }
}

/// `/preview_info.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewInfo {
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub preview_dir: String,
    #[serde(default)]
    pub source: String,
}

impl PreviewInfo {
    /// `preview_dir` relative to `cwd`, without a leading `/`
    pub fn relative_dir(&self) -> String {
        if self.preview_dir.is_empty() || self.cwd.is_empty() {
            return String::new();
        }
        let relative = self.preview_dir.replacen(&self.cwd, "", 1);
        relative.strip_prefix('/').unwrap_or(&relative).to_string()
    }

    /// Human readable model source
    pub fn source_label(&self) -> String {
        match self.source.as_str() {
            "demo" => "Demo Device".to_string(),
            "cwd/preview" | "cwd/_visualization" => format!("Default ({})", self.relative_dir()),
            "custom" => self.relative_dir(),
            _ => String::new(),
        }
    }
}

/// Body of `POST /set_preview_dir`; an empty path resets to the default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewDirRequest {
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServerError {
    #[serde(default)]
    error: Option<String>,
}

/// Warning shown after a failed preview-folder request
pub fn preview_dir_failure(body: Option<&str>, reset: bool) -> String {
    if reset {
        return "Unable to reset preview folder".to_string();
    }
    body.and_then(|b| serde_json::from_str::<ServerError>(b).ok())
        .and_then(|e| e.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "Unable to set preview folder".to_string())
}

/// Validate the auto-reload interval field
pub fn parse_interval_input(text: &str) -> Option<u32> {
    text.trim()
        .parse::<u32>()
        .ok()
        .filter(|ms| *ms >= MIN_INTERVAL_MS)
}

/// One saved bundle in the preview folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsFileInfo {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub mtime: f64,
    #[serde(default)]
    pub size: u64,
}

/// `/preview_settings_list.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFileList {
    #[serde(default)]
    pub preview_dir: String,
    #[serde(default)]
    pub files: Vec<SettingsFileInfo>,
    #[serde(default)]
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::HexColor;
    use crate::lights::LightOptions;
    use tempfile::TempDir;

    #[test]
    fn test_prefs_defaults_and_invalid_values() {
        let mut store = MemoryStore::new();
        assert_eq!(ViewerPrefs::load(&store), ViewerPrefs::default());

        store.set(AUTO_RELOAD_INTERVAL_KEY, "100").unwrap();
        store.set(AUTO_RELOAD_KEY, "false").unwrap();
        store.set(DEFAULT_CONTROL_TYPE_KEY, "spin").unwrap();
        store.set(AXES_VISIBLE_KEY, "yes").unwrap();
        let prefs = ViewerPrefs::load(&store);
        assert_eq!(prefs.auto_reload_interval_ms, 1000);
        assert!(!prefs.auto_reload);
        assert_eq!(prefs.default_control_type, ControlType::Orbit);
        assert!(prefs.axes_visible);
    }

    #[test]
    fn test_prefs_round_trip() {
        let mut store = MemoryStore::new();
        let prefs = ViewerPrefs {
            auto_reload: false,
            auto_reload_interval_ms: 500,
            axes_visible: false,
            default_control_type: ControlType::Trackball,
            model_selector_collapsed: true,
        };
        prefs.save(&mut store).unwrap();
        assert_eq!(store.get(AUTO_RELOAD_KEY).as_deref(), Some("false"));
        assert_eq!(store.get(DEFAULT_CONTROL_TYPE_KEY).as_deref(), Some("trackball"));
        assert_eq!(ViewerPrefs::load(&store), prefs);
    }

    #[test]
    fn test_malformed_camera_bundle_ignored() {
        let mut store = MemoryStore::new();
        assert!(load_camera_bundle(&store).is_none());
        store.set(CAMERAS_KEY, "{not json").unwrap();
        assert!(load_camera_bundle(&store).is_none());

        let bundle = CameraBundle {
            active_index: Some(0),
            cameras: vec![None],
            slot_count: Some(1),
        };
        save_camera_bundle(&mut store, &bundle).unwrap();
        assert_eq!(load_camera_bundle(&store), Some(bundle));
    }

    #[test]
    fn test_file_store_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("settings.json");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.set(AXES_VISIBLE_KEY, "false").unwrap();
            store.set(THEME_KEY, "light").unwrap();
            store.remove(THEME_KEY).unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(AXES_VISIBLE_KEY).as_deref(), Some("false"));
        assert!(store.get(THEME_KEY).is_none());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn test_file_store_rejects_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(FileStore::open(&path), Err(SettingsError::JsonError(_))));
    }

    #[test]
    fn test_bundle_export_import() {
        let mut store = MemoryStore::new();
        store.set(AXES_VISIBLE_KEY, "false").unwrap();
        store.set("unrelated", "1").unwrap();

        let mut lights = LightRig::new();
        lights.add_light(LightOptions {
            color: Some(HexColor::new(1, 2, 3)),
            ..Default::default()
        });
        let mut theme = ThemeState::default();
        theme.select("light").unwrap();

        let bundle = SettingsBundle::export(&store, &lights.state(), &theme);
        assert_eq!(bundle.local_storage.len(), 1);
        let json = bundle.to_json().unwrap();
        assert!(json.contains("\"localStorage\""));

        let parsed = SettingsBundle::from_json(&json).unwrap();
        let mut fresh_store = MemoryStore::new();
        let mut fresh_lights = LightRig::new();
        let mut fresh_theme = ThemeState::default();
        parsed
            .import(&mut fresh_store, &mut fresh_lights, &mut fresh_theme)
            .unwrap();

        assert_eq!(fresh_store.get(AXES_VISIBLE_KEY).as_deref(), Some("false"));
        assert!(fresh_store.get("unrelated").is_none());
        assert_eq!(fresh_lights.state(), lights.state());
        assert_eq!(fresh_theme, theme);
        assert_eq!(fresh_store.get(THEME_KEY).as_deref(), Some("light"));
    }

    #[test]
    fn test_bundle_rejects_bad_input() {
        assert!(matches!(
            SettingsBundle::from_json("{"),
            Err(SettingsError::JsonError(_))
        ));
        assert!(matches!(
            SettingsBundle::from_json(r#"{"version": 99}"#),
            Err(SettingsError::UnsupportedVersion(99))
        ));
        let minimal = SettingsBundle::from_json("{}").unwrap();
        assert_eq!(minimal.version, BUNDLE_VERSION);
        assert!(minimal.lights.is_none());
    }

    #[test]
    fn test_clear_persisted() {
        let mut store = MemoryStore::new();
        store.set(THEME_KEY, "dark").unwrap();
        store.set("other", "x").unwrap();
        clear_persisted(&mut store).unwrap();
        assert_eq!(store.keys(), vec!["other".to_string()]);
    }

    #[test]
    fn test_preview_info_labels() {
        let info = PreviewInfo {
            cwd: "/home/me/project".into(),
            preview_dir: "/home/me/project/out/preview".into(),
            source: "custom".into(),
        };
        assert_eq!(info.relative_dir(), "out/preview");
        assert_eq!(info.source_label(), "out/preview");

        let default = PreviewInfo {
            source: "cwd/preview".into(),
            ..info.clone()
        };
        assert_eq!(default.source_label(), "Default (out/preview)");

        let demo = PreviewInfo {
            source: "demo".into(),
            ..info.clone()
        };
        assert_eq!(demo.source_label(), "Demo Device");
        assert_eq!(PreviewInfo::default().source_label(), "");
        assert_eq!(PreviewInfo::default().relative_dir(), "");
    }

    #[test]
    fn test_preview_dir_failure_message() {
        assert_eq!(
            preview_dir_failure(Some(r#"{"error": "Folder does not exist"}"#), false),
            "Folder does not exist"
        );
        assert_eq!(preview_dir_failure(Some("oops"), false), "Unable to set preview folder");
        assert_eq!(preview_dir_failure(None, true), "Unable to reset preview folder");
    }

    #[test]
    fn test_interval_input() {
        assert_eq!(parse_interval_input(" 500 "), Some(500));
        assert_eq!(parse_interval_input("249"), None);
        assert_eq!(parse_interval_input("abc"), None);
    }

    #[test]
    fn test_settings_list_parse() {
        let list: SettingsFileList = serde_json::from_str(
            r#"{"preview_dir": "/p", "files": [{"name": "a.json", "path": "a.json", "mtime": 1.5, "size": 10}], "signature": "a.json:1.5:10"}"#,
        )
        .unwrap();
        assert_eq!(list.files[0].name, "a.json");
        assert_eq!(list.files[0].size, 10);
    }
}
