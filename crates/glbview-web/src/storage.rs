//! Browser-local settings storage and settings bundle import

use bevy::prelude::*;
use tracing::{info, warn};
use glbview_core::settings::{load_camera_bundle, save_camera_bundle, SettingsStore};
#[cfg(not(target_arch = "wasm32"))]
use glbview_core::settings::MemoryStore;
use glbview_core::{CameraEvent, SettingsBundle, ViewerPrefs};

use crate::app::{Lights, MainCameraRig, Prefs, Reload, Theme};
use crate::network::ServerState;
use crate::scene::CameraChanged;

pub struct StoragePlugin;

impl Plugin for StoragePlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<ImportSettings>()
            .add_systems(Update, import_settings)
            .add_systems(
                PostUpdate,
                (persist_camera_slots, persist_prefs, persist_theme),
            );
    }
}

/// Apply a settings bundle (JSON text) from a file or the server
#[derive(Message, Debug, Clone)]
pub struct ImportSettings {
    pub json: String,
}

/// Key/value store shared by every system that persists something.
///
/// `localStorage` in the browser, memory on native builds.
#[derive(Resource)]
pub struct Settings(Box<dyn SettingsStore + Send + Sync>);

impl Settings {
    pub fn open() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            Self(Box::new(LocalStorage))
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Self(Box::new(MemoryStore::new()))
        }
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.0.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn SettingsStore {
        self.0.as_mut()
    }
}

/// `window.localStorage`, looked up on every call
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    fn storage() -> Result<web_sys::Storage, glbview_core::SettingsError> {
        use glbview_core::SettingsError;

        web_sys::window()
            .ok_or_else(|| SettingsError::Storage("no window".to_string()))?
            .local_storage()
            .map_err(|e| SettingsError::Storage(format!("{:?}", e)))?
            .ok_or_else(|| SettingsError::Storage("localStorage unavailable".to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
impl SettingsStore for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage().ok()?.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), glbview_core::SettingsError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| glbview_core::SettingsError::Storage(format!("{:?}", e)))
    }

    fn remove(&mut self, key: &str) -> Result<(), glbview_core::SettingsError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| glbview_core::SettingsError::Storage(format!("{:?}", e)))
    }

    fn keys(&self) -> Vec<String> {
        let Ok(storage) = Self::storage() else {
            return Vec::new();
        };
        let len = storage.length().unwrap_or(0);
        (0..len).filter_map(|i| storage.key(i).ok().flatten()).collect()
    }
}

/// Write the bundle's keys, lights and theme, then reload everything that
/// is read from the store
#[allow(clippy::too_many_arguments)]
fn import_settings(
    mut requests: MessageReader<ImportSettings>,
    mut settings: ResMut<Settings>,
    mut lights: ResMut<Lights>,
    mut theme: ResMut<Theme>,
    mut prefs: ResMut<Prefs>,
    mut reload: ResMut<Reload>,
    mut rig: ResMut<MainCameraRig>,
    mut server: ResMut<ServerState>,
) {
    for request in requests.read() {
        let bundle = match SettingsBundle::from_json(&request.json) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Ignoring settings bundle: {}", e);
                server.settings_status = Some(format!("Import failed: {}", e));
                continue;
            }
        };
        if let Err(e) = bundle.import(settings.store_mut(), &mut lights, &mut theme) {
            warn!("Settings import incomplete: {}", e);
            server.settings_status = Some(format!("Import incomplete: {}", e));
            continue;
        }

        prefs.0 = ViewerPrefs::load(settings.store());
        reload.set_enabled(prefs.auto_reload);
        reload.set_interval_ms(prefs.auto_reload_interval_ms);
        rig.set_default_control_type(prefs.default_control_type);
        rig.init_slots(load_camera_bundle(settings.store()));
        rig.reset_home();
        info!(keys = bundle.local_storage.len(), "Settings imported");
        server.settings_status = Some("Settings imported".to_string());
    }
}

fn persist_camera_slots(
    mut changes: MessageReader<CameraChanged>,
    rig: Res<MainCameraRig>,
    mut settings: ResMut<Settings>,
) {
    let slots_changed = changes
        .read()
        .any(|change| change.0 == CameraEvent::SlotsChanged);
    if !slots_changed {
        return;
    }
    if let Err(e) = save_camera_bundle(settings.store_mut(), &rig.to_bundle()) {
        warn!("Failed to save camera slots: {}", e);
    }
}

fn persist_prefs(prefs: Res<Prefs>, mut settings: ResMut<Settings>) {
    if !prefs.is_changed() || prefs.is_added() {
        return;
    }
    if let Err(e) = prefs.save(settings.store_mut()) {
        warn!("Failed to save preferences: {}", e);
    }
}

fn persist_theme(theme: Res<Theme>, mut settings: ResMut<Settings>) {
    if !theme.is_changed() || theme.is_added() {
        return;
    }
    if let Err(e) = theme.save(settings.store_mut()) {
        warn!("Failed to save theme: {}", e);
    }
}
