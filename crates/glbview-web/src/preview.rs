//! Settings preview viewport
//!
//! A second camera renders into the rectangle the settings dialog reserves
//! for it. Camera-slot helpers are shown while the camera tab is open and
//! double-clicks in the viewport pick points on the models.

use bevy::camera::Viewport;
use bevy::prelude::*;
use tracing::{debug, info};
use bevy::window::PrimaryWindow;
use bevy_picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings, RayCastVisibility};
use glbview_core::pose::scene_to_model;

use crate::app::{Config, Lights, MainCameraRig, Preview, Theme};
use crate::lights::HelperMeshes;
use crate::models::ModelMesh;
use crate::scene::{to_color, WorldRoot};

pub struct PreviewPlugin;

impl Plugin for PreviewPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PreviewViewport>()
            .add_message::<PreviewPick>()
            .add_systems(Startup, setup_preview_camera)
            .add_systems(
                Update,
                (
                    update_preview_camera,
                    handle_preview_pick,
                    sync_camera_helpers,
                )
                    .chain(),
            );
    }
}

/// Marker for the preview camera
#[derive(Component)]
pub struct PreviewCamera;

/// Saved camera slot (or the live camera when `slot` is `None`)
#[derive(Component)]
pub struct CameraHelper {
    pub slot: Option<usize>,
}

/// Logical-pixel rectangle reserved by the dialog this frame
#[derive(Resource, Default)]
pub struct PreviewViewport {
    pub rect: Option<Rect>,
}

/// Double-click inside the preview, relative to its top-left corner
#[derive(Message, Debug, Clone, Copy)]
pub struct PreviewPick {
    pub position: Vec2,
}

fn setup_preview_camera(mut commands: Commands, config: Res<Config>, theme: Res<Theme>) {
    commands.spawn((
        Camera3d::default(),
        Camera {
            order: 1,
            is_active: false,
            clear_color: ClearColorConfig::Custom(to_color(theme.colors().section_bg)),
            ..default()
        },
        Projection::Perspective(PerspectiveProjection {
            fov: config.preview_fov_deg.to_radians(),
            near: config.near,
            far: config.preview_far,
            ..default()
        }),
        Transform::from_xyz(0.0, 0.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
        AmbientLight::default(),
        PreviewCamera,
    ));
}

fn update_preview_camera(
    mut preview: ResMut<Preview>,
    viewport: Res<PreviewViewport>,
    theme: Res<Theme>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut cameras: Query<(&mut Camera, &mut Transform), With<PreviewCamera>>,
) {
    let Ok((mut camera, mut transform)) = cameras.single_mut() else {
        return;
    };
    let Ok(window) = windows.single() else {
        return;
    };

    let rect = viewport.rect.filter(|_| preview.preview_active());
    let Some(rect) = rect else {
        if camera.is_active {
            camera.is_active = false;
        }
        return;
    };

    let scale = window.scale_factor();
    let size = window.physical_size();
    let min = (rect.min * scale).as_uvec2().min(size);
    let max = (rect.max * scale).as_uvec2().min(size);
    if max.x <= min.x || max.y <= min.y {
        camera.is_active = false;
        return;
    }
    camera.is_active = true;
    camera.viewport = Some(Viewport {
        physical_position: min,
        physical_size: max - min,
        ..default()
    });
    if theme.is_changed() {
        camera.clear_color = ClearColorConfig::Custom(to_color(theme.colors().section_bg));
    }

    // Damped orbit; the preview never marks the dialog state changed
    let state = preview.bypass_change_detection();
    state.camera.update();
    *transform = Transform::from_translation(state.camera.position)
        .looking_at(state.camera.target, Vec3::Y);
}

fn handle_preview_pick(
    mut picks: MessageReader<PreviewPick>,
    mut ray_cast: MeshRayCast,
    cameras: Query<(&Camera, &GlobalTransform), With<PreviewCamera>>,
    model_meshes: Query<(), With<ModelMesh>>,
    mut preview: ResMut<Preview>,
    mut rig: ResMut<MainCameraRig>,
    mut lights: ResMut<Lights>,
) {
    let Some(pick) = picks.read().last().copied() else {
        return;
    };
    let Ok((camera, transform)) = cameras.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(transform, pick.position) else {
        return;
    };
    let filter = |entity: Entity| model_meshes.contains(entity);
    let settings = MeshRayCastSettings::default()
        .with_filter(&filter)
        .with_visibility(RayCastVisibility::Visible);
    let Some((_, hit)) = ray_cast.cast_ray(ray, &settings).first() else {
        debug!("Preview pick missed");
        return;
    };
    let point = hit.point;
    if let Some(action) = preview.pick(point) {
        info!(?action, "Preview pick");
        preview.apply_pick(action, &mut rig, &mut lights);
    }
}

/// One cone per saved slot plus one for the live camera, aimed at the target
#[allow(clippy::too_many_arguments)]
fn sync_camera_helpers(
    mut commands: Commands,
    rig: Res<MainCameraRig>,
    preview: Res<Preview>,
    helper_meshes: Option<Res<HelperMeshes>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    world: Query<Entity, With<WorldRoot>>,
    mut helpers: Query<(
        Entity,
        &CameraHelper,
        &mut Transform,
        &mut Visibility,
        &MeshMaterial3d<StandardMaterial>,
    )>,
) {
    if !rig.is_changed() && !preview.is_changed() {
        return;
    }
    let (Ok(world), Some(helper_meshes)) = (world.single(), helper_meshes) else {
        return;
    };

    let mut poses: Vec<(Option<usize>, Vec3, Vec3, bool)> = (0..rig.slot_count())
        .filter_map(|i| {
            rig.slot(i)
                .map(|slot| (Some(i), slot.pos, slot.target, rig.slot_highlighted(i)))
        })
        .collect();
    poses.push((
        None,
        scene_to_model(rig.position()),
        scene_to_model(rig.target()),
        true,
    ));

    let visibility = if preview.camera_helpers_visible() {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    let color = to_color(glbview_core::HexColor::new(0xff, 0xcc, 0x33));

    let existing: Vec<Option<usize>> = helpers.iter().map(|(_, h, ..)| h.slot).collect();
    let wanted: Vec<Option<usize>> = poses.iter().map(|p| p.0).collect();
    if existing.len() != wanted.len() || existing.iter().any(|s| !wanted.contains(s)) {
        for (entity, ..) in &helpers {
            commands.entity(entity).despawn();
        }
        for (slot, pos, target, highlighted) in poses {
            commands.spawn((
                Mesh3d(helper_meshes.frustum.clone()),
                MeshMaterial3d(materials.add(helper_material(color, highlighted))),
                helper_transform(pos, target),
                visibility,
                CameraHelper { slot },
                ChildOf(world),
            ));
        }
        return;
    }

    for (_, helper, mut transform, mut helper_visibility, material) in &mut helpers {
        let Some(&(_, pos, target, highlighted)) = poses.iter().find(|p| p.0 == helper.slot) else {
            continue;
        };
        *transform = helper_transform(pos, target);
        *helper_visibility = visibility;
        if let Some(material) = materials.get_mut(&material.0) {
            *material = helper_material(color, highlighted);
        }
    }
}

fn helper_material(color: Color, highlighted: bool) -> StandardMaterial {
    StandardMaterial {
        base_color: color.with_alpha(if highlighted { 1.0 } else { 0.33 }),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        ..default()
    }
}

/// Cone at `pos` whose tip points at `target`, sized to the distance
fn helper_transform(pos: Vec3, target: Vec3) -> Transform {
    let offset = target - pos;
    let length = offset.length();
    let size = (length * 0.05).max(0.05);
    let rotation = if length > 0.0 {
        Quat::from_rotation_arc(Vec3::Y, offset / length)
    } else {
        Quat::IDENTITY
    };
    Transform::from_translation(pos)
        .with_rotation(rotation)
        .with_scale(Vec3::new(size * 0.6, size, size * 0.6))
}
