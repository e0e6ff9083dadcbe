//! Bevy application setup

use bevy::prelude::*;
use tracing::info;
use bevy_egui::EguiPlugin;
use bevy_picking::{prelude::MeshPickingPlugin, DefaultPickingPlugins};
use glbview_core::settings::load_camera_bundle;
use glbview_core::{
    AutoReload, CameraRig, LightRig, ModelWatcher, PreviewState, ThemeState, ViewerConfig,
    ViewerPrefs,
};

use crate::file_picker::FilePickerPlugin;
use crate::lights::LightsPlugin;
use crate::models::ModelsPlugin;
use crate::network::NetworkPlugin;
use crate::preview::PreviewPlugin;
use crate::scene::ScenePlugin;
use crate::storage::{Settings, StoragePlugin};
use crate::ui::UiPlugin;

/// Viewer configuration read from the page URL
#[derive(Resource, Clone, Deref)]
pub struct Config(pub ViewerConfig);

/// Main camera state; the camera entity follows it every frame
#[derive(Resource, Deref, DerefMut)]
pub struct MainCameraRig(pub CameraRig);

/// Ambient and directional/spot lights, in model space
#[derive(Resource, Deref, DerefMut, Default)]
pub struct Lights(pub LightRig);

/// Current model list, per-model visibility and modification stamps
#[derive(Resource, Deref, DerefMut)]
pub struct Watcher(pub ModelWatcher);

impl Default for Watcher {
    fn default() -> Self {
        Self(ModelWatcher::new())
    }
}

/// Auto-reload toggle, interval and offline indicator
#[derive(Resource, Deref, DerefMut, Default)]
pub struct Reload(pub AutoReload);

/// Persisted scalar preferences
#[derive(Resource, Deref, DerefMut, Default)]
pub struct Prefs(pub ViewerPrefs);

#[derive(Resource, Deref, DerefMut, Default)]
pub struct Theme(pub ThemeState);

/// Settings dialog and preview camera state
#[derive(Resource, Deref, DerefMut, Default)]
pub struct Preview(pub PreviewState);

pub fn run(config: ViewerConfig) {
    let settings = Settings::open();
    let prefs = ViewerPrefs::load(settings.store());
    let theme = ThemeState::load(settings.store());

    let mut rig = CameraRig::new(1.0).with_lens(config.fov_deg, config.near, config.far);
    rig.set_default_control_type(prefs.default_control_type);
    let saved = rig.init_slots(load_camera_bundle(settings.store()));
    info!(saved, slots = rig.slot_count(), "Camera slots initialized");

    let reload = AutoReload::new(prefs.auto_reload, prefs.auto_reload_interval_ms);
    let clear = theme.colors().bg.to_rgb_f32();

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "glbview".to_string(),
                        canvas: Some("#glbview-canvas".to_string()),
                        fit_canvas_to_parent: true,
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Model URLs come from the server list; an empty root keeps them same-origin
                    file_path: config.server.clone(),
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                }),
        )
        // Picking must come before EguiPlugin so egui can block clicks through panels
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(EguiPlugin::default())
        .insert_resource(ClearColor(Color::srgb(clear[0], clear[1], clear[2])))
        .insert_resource(Config(config))
        .insert_resource(MainCameraRig(rig))
        .insert_resource(Reload(reload))
        .insert_resource(Prefs(prefs))
        .insert_resource(Theme(theme))
        .insert_resource(settings)
        .init_resource::<Lights>()
        .init_resource::<Watcher>()
        .init_resource::<Preview>()
        .add_plugins((
            ScenePlugin,
            ModelsPlugin,
            LightsPlugin,
            NetworkPlugin,
            PreviewPlugin,
            StoragePlugin,
            FilePickerPlugin,
            UiPlugin,
        ))
        .run();
}
