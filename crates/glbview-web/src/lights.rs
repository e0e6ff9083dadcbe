//! Light entities and helpers following the [`Lights`] rig

use bevy::prelude::*;
use tracing::debug;
use glbview_core::lights::Light;
use glbview_core::{LightEvent, LightKind};

use crate::app::{Lights, Preview};
use crate::scene::{to_color, WorldRoot};

pub struct LightsPlugin;

impl Plugin for LightsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpawnedLights>()
            .add_message::<LightsChanged>()
            .add_systems(Startup, create_helper_meshes)
            .add_systems(
                Update,
                (
                    dispatch_light_events,
                    sync_ambient,
                    sync_lights,
                    update_light_helper_visibility,
                )
                    .chain(),
            );
    }
}

/// Scene units per rig intensity unit (lux for directional, candela for spot)
const LIGHT_UNIT_SCALE: f32 = 3000.0;

/// Ambient luminance per rig intensity unit
const AMBIENT_UNIT_SCALE: f32 = 500.0;

/// Spot range used when the rig says "unlimited"
const UNLIMITED_RANGE: f32 = 1.0e5;

/// Helper opacity for the active and the other lights
const ACTIVE_HELPER_ALPHA: f32 = 1.0;
const INACTIVE_HELPER_ALPHA: f32 = 0.33;

/// A drained [`LightEvent`], rebroadcast to the rest of the app
#[derive(Message, Debug, Clone, Copy)]
pub struct LightsChanged(pub LightEvent);

/// Meshes shared by light and camera helpers
#[derive(Resource, Clone)]
pub struct HelperMeshes {
    pub marker: Handle<Mesh>,
    /// Unit-height cylinder, scaled along Y to the line length
    pub line: Handle<Mesh>,
    pub frustum: Handle<Mesh>,
}

/// Light source entity
#[derive(Component)]
pub struct LightSource {
    pub index: usize,
}

/// Marker or aim line drawn for a light while the lights tab is open
#[derive(Component)]
pub struct LightHelper;

struct SpawnedLight {
    kind: LightKind,
    source: Entity,
    marker: Entity,
    line: Entity,
}

#[derive(Resource, Default)]
pub struct SpawnedLights {
    entries: Vec<SpawnedLight>,
}

fn create_helper_meshes(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    commands.insert_resource(HelperMeshes {
        marker: meshes.add(Sphere::new(1.0)),
        line: meshes.add(Cylinder::new(1.0, 1.0)),
        frustum: meshes.add(Cone::new(1.0, 1.0)),
    });
}

fn dispatch_light_events(mut lights: ResMut<Lights>, mut changes: MessageWriter<LightsChanged>) {
    for event in lights.bypass_change_detection().drain_events() {
        changes.write(LightsChanged(event));
    }
}

fn sync_ambient(lights: Res<Lights>, mut ambients: Query<&mut AmbientLight>) {
    if !lights.is_changed() {
        return;
    }
    for mut ambient in &mut ambients {
        ambient.color = to_color(lights.ambient.color);
        ambient.brightness = lights.ambient.intensity * AMBIENT_UNIT_SCALE;
    }
}

/// Transform of a light in model space, facing its target
fn light_transform(light: &Light) -> Transform {
    Transform::from_translation(light.position).looking_at(light.target, Vec3::Z)
}

fn spot_light(light: &Light) -> SpotLight {
    let range = if light.distance > 0.0 {
        light.distance
    } else {
        UNLIMITED_RANGE
    };
    SpotLight {
        color: to_color(light.color),
        intensity: light.intensity * LIGHT_UNIT_SCALE * 4.0 * std::f32::consts::PI,
        range,
        outer_angle: light.angle,
        inner_angle: light.angle * (1.0 - light.penumbra),
        shadows_enabled: false,
        ..default()
    }
}

fn directional_light(light: &Light) -> DirectionalLight {
    DirectionalLight {
        color: to_color(light.color),
        illuminance: light.intensity * LIGHT_UNIT_SCALE,
        shadows_enabled: false,
        ..default()
    }
}

/// Marker at the light position and a line toward its target
fn helper_transforms(light: &Light) -> (Transform, Transform) {
    let offset = light.target - light.position;
    let length = offset.length();
    let size = (length * 0.03).max(0.05);
    let marker = Transform::from_translation(light.position).with_scale(Vec3::splat(size));
    let rotation = if length > 0.0 {
        Quat::from_rotation_arc(Vec3::Y, offset / length)
    } else {
        Quat::IDENTITY
    };
    let line = Transform::from_translation(light.position + offset * 0.5)
        .with_rotation(rotation)
        .with_scale(Vec3::new(size * 0.1, length.max(1e-4), size * 0.1));
    (marker, line)
}

fn helper_material(light: &Light, active: bool) -> StandardMaterial {
    let alpha = if active {
        ACTIVE_HELPER_ALPHA
    } else {
        INACTIVE_HELPER_ALPHA
    };
    StandardMaterial {
        base_color: to_color(light.color).with_alpha(alpha),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        ..default()
    }
}

/// Respawn when the number or kinds of lights change, update in place otherwise
#[allow(clippy::too_many_arguments)]
fn sync_lights(
    mut commands: Commands,
    lights: Res<Lights>,
    preview: Res<Preview>,
    helper_meshes: Option<Res<HelperMeshes>>,
    mut spawned: ResMut<SpawnedLights>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    world: Query<Entity, With<WorldRoot>>,
    mut transforms: Query<&mut Transform>,
    mut directionals: Query<&mut DirectionalLight>,
    mut spots: Query<&mut SpotLight>,
    helper_materials: Query<&MeshMaterial3d<StandardMaterial>, With<LightHelper>>,
) {
    if !lights.is_changed() {
        return;
    }
    let (Ok(world), Some(helper_meshes)) = (world.single(), helper_meshes) else {
        return;
    };

    let same_structure = spawned.entries.len() == lights.lights().len()
        && spawned
            .entries
            .iter()
            .zip(lights.lights())
            .all(|(entry, light)| entry.kind == light.kind);

    if !same_structure {
        for entry in spawned.entries.drain(..) {
            commands.entity(entry.source).despawn();
            commands.entity(entry.marker).despawn();
            commands.entity(entry.line).despawn();
        }
        let helper_visibility = if preview.light_helpers_visible() {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        for (index, light) in lights.lights().iter().enumerate() {
            let mut source = commands.spawn((
                light_transform(light),
                LightSource { index },
                ChildOf(world),
            ));
            match light.kind {
                LightKind::Directional => source.insert(directional_light(light)),
                LightKind::Spot => source.insert(spot_light(light)),
            };
            let source = source.id();

            let active = index == lights.active_index();
            let (marker_transform, line_transform) = helper_transforms(light);
            let material = materials.add(helper_material(light, active));
            let marker = commands
                .spawn((
                    Mesh3d(helper_meshes.marker.clone()),
                    MeshMaterial3d(material.clone()),
                    marker_transform,
                    helper_visibility,
                    LightHelper,
                    ChildOf(world),
                ))
                .id();
            let line = commands
                .spawn((
                    Mesh3d(helper_meshes.line.clone()),
                    MeshMaterial3d(material),
                    line_transform,
                    helper_visibility,
                    LightHelper,
                    ChildOf(world),
                ))
                .id();
            spawned.entries.push(SpawnedLight {
                kind: light.kind,
                source,
                marker,
                line,
            });
        }
        debug!(count = spawned.entries.len(), "Light entities rebuilt");
        return;
    }

    for (index, (entry, light)) in spawned.entries.iter().zip(lights.lights()).enumerate() {
        if let Ok(mut transform) = transforms.get_mut(entry.source) {
            *transform = light_transform(light);
        }
        match light.kind {
            LightKind::Directional => {
                if let Ok(mut directional) = directionals.get_mut(entry.source) {
                    *directional = directional_light(light);
                }
            }
            LightKind::Spot => {
                if let Ok(mut spot) = spots.get_mut(entry.source) {
                    *spot = spot_light(light);
                }
            }
        }

        let (marker_transform, line_transform) = helper_transforms(light);
        if let Ok(mut transform) = transforms.get_mut(entry.marker) {
            *transform = marker_transform;
        }
        if let Ok(mut transform) = transforms.get_mut(entry.line) {
            *transform = line_transform;
        }
        if let Ok(material) = helper_materials.get(entry.marker) {
            if let Some(material) = materials.get_mut(&material.0) {
                *material = helper_material(light, index == lights.active_index());
            }
        }
    }
}

fn update_light_helper_visibility(
    preview: Res<Preview>,
    mut helpers: Query<&mut Visibility, With<LightHelper>>,
) {
    if !preview.is_changed() {
        return;
    }
    let visibility = if preview.light_helpers_visible() {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    for mut helper in &mut helpers {
        if *helper != visibility {
            *helper = visibility;
        }
    }
}
