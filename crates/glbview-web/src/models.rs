//! GLB model loading, visibility and scene bounds

use bevy::camera::primitives::Aabb as MeshBounds;
use bevy::gltf::Gltf;
use bevy::prelude::*;
use tracing::{info, warn};
use bevy::scene::{SceneInstance, SceneSpawner};
use glbview_core::models::cache_busted;
use glbview_core::pose::scene_to_model;
use glbview_core::{Aabb, SceneBounds};

use crate::app::{Lights, MainCameraRig, Watcher};
use crate::network::RefreshPreviewInfo;
use crate::scene::WorldRoot;

pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelSet>()
            .add_message::<ReloadModels>()
            .add_message::<ModelsLoaded>()
            .add_systems(
                Update,
                (
                    reload_models,
                    spawn_loaded_models,
                    tag_model_meshes,
                    update_model_visibility,
                    track_scene_ready,
                    update_scene_bounds,
                    on_models_loaded,
                )
                    .chain(),
            );
    }
}

/// Request to drop every model and load the current list again
#[derive(Message, Debug, Clone, Copy, Default)]
pub struct ReloadModels;

/// Every model of the last reload is in the scene and measured
#[derive(Message, Debug, Clone, Copy)]
pub struct ModelsLoaded {
    pub count: usize,
}

/// Scene root of one listed model
#[derive(Component)]
pub struct ModelEntity {
    pub index: usize,
}

/// Mesh belonging to a listed model
#[derive(Component)]
pub struct ModelMesh {
    pub index: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    #[default]
    Idle,
    /// Waiting for GLB assets
    Loading,
    /// Scenes spawned, waiting for their instances
    Spawning,
    /// Instances ready; bounds settle during the next frame
    Settling,
}

/// Models being loaded for the current list
#[derive(Resource, Default)]
pub struct ModelSet {
    phase: LoadPhase,
    loading: Vec<(usize, Handle<Gltf>)>,
    spawned: usize,
    /// Whether the first load has framed the camera
    framed: bool,
}

impl ModelSet {
    pub fn is_loading(&self) -> bool {
        self.phase != LoadPhase::Idle
    }
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn cache_stamp() -> u64 {
    js_sys::Date::now() as u64
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn cache_stamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn reload_models(
    mut commands: Commands,
    mut requests: MessageReader<ReloadModels>,
    mut set: ResMut<ModelSet>,
    mut watcher: ResMut<Watcher>,
    asset_server: Res<AssetServer>,
    existing: Query<Entity, With<ModelEntity>>,
) {
    if requests.read().count() == 0 {
        return;
    }
    for entity in &existing {
        commands.entity(entity).despawn();
    }
    watcher.reset_stamps();

    let stamp = cache_stamp();
    set.loading = watcher
        .list()
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            // Asset paths are relative to the server root
            let path = cache_busted(descriptor.file.trim_start_matches('/'), stamp);
            (index, asset_server.load::<Gltf>(path))
        })
        .collect();
    set.spawned = 0;
    set.phase = LoadPhase::Loading;
    info!(count = set.loading.len(), "Loading models");
}

fn spawn_loaded_models(
    mut commands: Commands,
    mut set: ResMut<ModelSet>,
    asset_server: Res<AssetServer>,
    gltfs: Res<Assets<Gltf>>,
    watcher: Res<Watcher>,
    world: Query<Entity, With<WorldRoot>>,
) {
    if set.phase != LoadPhase::Loading {
        return;
    }
    let Ok(world) = world.single() else {
        return;
    };

    let mut still_loading = Vec::new();
    let mut spawned = 0;
    for (index, handle) in std::mem::take(&mut set.loading) {
        if let Some(bevy::asset::LoadState::Failed(e)) = asset_server.get_load_state(handle.id()) {
            warn!(index, "Failed to load model: {}", e);
            continue;
        }
        if !asset_server.is_loaded_with_dependencies(handle.id()) {
            still_loading.push((index, handle));
            continue;
        }
        let Some(gltf) = gltfs.get(&handle) else {
            still_loading.push((index, handle));
            continue;
        };
        let Some(scene) = gltf.default_scene.clone().or_else(|| gltf.scenes.first().cloned())
        else {
            warn!(index, "Model has no scene");
            continue;
        };
        let visibility = if watcher.is_visible(index) {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        commands.spawn((
            SceneRoot(scene),
            Transform::default(),
            visibility,
            ModelEntity { index },
            ChildOf(world),
        ));
        spawned += 1;
    }
    set.spawned += spawned;
    set.loading = still_loading;
    if set.loading.is_empty() {
        set.phase = LoadPhase::Spawning;
    }
}

/// Tag new meshes with their model and apply the viewer's material tweaks
fn tag_model_meshes(
    mut commands: Commands,
    meshes: Query<(Entity, Option<&MeshMaterial3d<StandardMaterial>>), Added<Mesh3d>>,
    parents: Query<&ChildOf>,
    models: Query<&ModelEntity>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for (entity, material) in &meshes {
        let Some(index) = parents
            .iter_ancestors(entity)
            .find_map(|ancestor| models.get(ancestor).ok().map(|m| m.index))
        else {
            continue;
        };
        commands.entity(entity).insert(ModelMesh { index });
        if let Some(material) = material.and_then(|m| materials.get_mut(&m.0)) {
            material.metallic = 0.5;
            material.alpha_mode = AlphaMode::Blend;
        }
    }
}

fn update_model_visibility(
    watcher: Res<Watcher>,
    mut models: Query<(&ModelEntity, &mut Visibility)>,
) {
    if !watcher.is_changed() {
        return;
    }
    for (model, mut visibility) in &mut models {
        *visibility = if watcher.is_visible(model.index) {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

fn track_scene_ready(
    mut set: ResMut<ModelSet>,
    mut loaded: MessageWriter<ModelsLoaded>,
    scene_spawner: Res<SceneSpawner>,
    models: Query<Option<&SceneInstance>, With<ModelEntity>>,
) {
    match set.phase {
        LoadPhase::Spawning => {
            let ready = models.iter().all(|instance| {
                instance.is_some_and(|instance| scene_spawner.instance_is_ready(**instance))
            });
            if ready {
                set.phase = LoadPhase::Settling;
            }
        }
        LoadPhase::Settling => {
            set.phase = LoadPhase::Idle;
            loaded.write(ModelsLoaded { count: set.spawned });
        }
        _ => {}
    }
}

/// Scene-space boxes of the reference model and the visible models
fn update_scene_bounds(
    watcher: Res<Watcher>,
    meshes: Query<(&ModelMesh, &MeshBounds, &GlobalTransform)>,
    mut rig: ResMut<MainCameraRig>,
    mut lights: ResMut<Lights>,
) {
    let reference_index = watcher.reference_index();
    let mut reference: Option<Aabb> = None;
    let mut visible: Option<Aabb> = None;
    for (mesh, bounds, transform) in &meshes {
        let local = Aabb::new(
            Vec3::from(bounds.center - bounds.half_extents),
            Vec3::from(bounds.center + bounds.half_extents),
        );
        let world = local.transformed(&transform.affine());
        if !world.is_finite() {
            continue;
        }
        let slot = if Some(mesh.index) == reference_index {
            &mut reference
        } else if watcher.is_visible(mesh.index) {
            &mut visible
        } else {
            continue;
        };
        *slot = Some(slot.map_or(world, |b| b.union(&world)));
    }

    let next = SceneBounds {
        reference: reference.zip(reference_index.map(|i| watcher.is_visible(i))),
        visible,
    };
    if rig.bounds != next {
        rig.bounds = next;
        let center = scene_to_model(next.model_center());
        if lights.model_center() != center {
            lights.set_model_center(center);
        }
    }
}

fn on_models_loaded(
    mut loaded: MessageReader<ModelsLoaded>,
    mut set: ResMut<ModelSet>,
    mut rig: ResMut<MainCameraRig>,
    mut lights: ResMut<Lights>,
    mut refresh: MessageWriter<RefreshPreviewInfo>,
) {
    let Some(event) = loaded.read().last().copied() else {
        return;
    };
    info!(count = event.count, "Models loaded");
    lights.ensure_default_light();
    if !set.framed {
        set.framed = true;
        rig.reset_home();
    }
    refresh.write(RefreshPreviewInfo);
}
