//! 3D scene management
//!
//! The world group carries the Z-up model content and is rotated into
//! Bevy's Y-up scene space. The main camera lives outside it and follows
//! the [`MainCameraRig`] in scene space.

use bevy::camera::ScalingMode;
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseScrollUnit};
use bevy::prelude::*;
use tracing::debug;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use glbview_core::camera::ProjectionState;
use glbview_core::pose::world_rotation;
use glbview_core::{CameraEvent, CameraRig, ControlType, HexColor};

use crate::app::{Config, MainCameraRig, Prefs, Theme};

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<NavigationState>()
            .add_message::<CameraChanged>()
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                (
                    track_window_aspect,
                    navigate_camera,
                    dispatch_camera_events,
                    sync_main_camera,
                    apply_theme,
                    update_axes_visibility,
                )
                    .chain(),
            );
    }
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Root of all model content, rotated from Z-up to Y-up
#[derive(Component)]
pub struct WorldRoot;

/// One of the three world axis lines
#[derive(Component)]
pub struct WorldAxis {
    pub axis: usize,
}

/// A drained [`CameraEvent`], rebroadcast to the rest of the app
#[derive(Message, Debug, Clone, Copy)]
pub struct CameraChanged(pub CameraEvent);

/// Trackball momentum carried between frames after a drag ends
#[derive(Resource, Default)]
pub struct NavigationState {
    momentum: Vec2,
}

/// Residual trackball rotation below which momentum stops
const MOMENTUM_EPSILON: f32 = 1e-5;

/// Pixels per scroll "line" for touchpads that report pixels
const PIXELS_PER_LINE: f32 = 100.0;

pub fn to_color(color: HexColor) -> Color {
    let [r, g, b] = color.to_rgb_f32();
    Color::srgb(r, g, b)
}

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<Config>,
    rig: Res<MainCameraRig>,
    theme: Res<Theme>,
    prefs: Res<Prefs>,
) {
    commands.spawn((
        Camera3d::default(),
        projection_for(&rig),
        camera_transform(&rig),
        // Per-camera ambient so the preview camera matches; lights.rs keeps both in sync
        AmbientLight::default(),
        MainCamera,
    ));

    let world = commands
        .spawn((
            Transform::from_rotation(world_rotation()),
            Visibility::default(),
            WorldRoot,
        ))
        .id();

    // Axes in model space: X, Y and Z (up)
    let length = config.axes_length;
    let thickness = length * 5e-4;
    let colors = theme.colors();
    let visibility = if prefs.axes_visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    let axes = [
        (
            colors.axis_x,
            Transform::from_translation(Vec3::new(length / 2.0, 0.0, 0.0))
                .with_rotation(Quat::from_rotation_z(-std::f32::consts::FRAC_PI_2)),
        ),
        (
            colors.axis_y,
            Transform::from_translation(Vec3::new(0.0, length / 2.0, 0.0)),
        ),
        (
            colors.axis_z,
            Transform::from_translation(Vec3::new(0.0, 0.0, length / 2.0))
                .with_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
        ),
    ];
    let mesh = meshes.add(Cylinder::new(thickness, length));
    for (axis, (color, transform)) in axes.into_iter().enumerate() {
        commands.spawn((
            Mesh3d(mesh.clone()),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: to_color(color),
                unlit: true,
                ..default()
            })),
            transform,
            visibility,
            WorldAxis { axis },
            ChildOf(world),
        ));
    }
}

/// Bevy projection for the rig's current lens
pub fn projection_for(rig: &CameraRig) -> Projection {
    match rig.projection() {
        ProjectionState::Perspective { fov_deg, near, far } => {
            Projection::Perspective(PerspectiveProjection {
                fov: fov_deg.to_radians(),
                aspect_ratio: rig.aspect(),
                near,
                far,
                ..default()
            })
        }
        ProjectionState::Orthographic(frustum) => {
            let (width, height) = (frustum.width(), frustum.height());
            Projection::Orthographic(OrthographicProjection {
                near: frustum.near,
                far: frustum.far,
                scaling_mode: ScalingMode::Fixed { width, height },
                viewport_origin: Vec2::new(-frustum.left / width, -frustum.bottom / height),
                ..OrthographicProjection::default_3d()
            })
        }
    }
}

pub fn camera_transform(rig: &CameraRig) -> Transform {
    Transform::from_translation(rig.position()).looking_at(rig.target(), rig.up())
}

fn track_window_aspect(
    windows: Query<&Window, With<PrimaryWindow>>,
    mut rig: ResMut<MainCameraRig>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let (width, height) = (window.width(), window.height());
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    let aspect = width / height;
    if (rig.aspect() - aspect).abs() > 1e-6 {
        rig.set_aspect(aspect);
    }
}

/// Orbit or trackball rotation on left drag, pan on right drag, zoom on scroll
fn navigate_camera(
    mut rig: ResMut<MainCameraRig>,
    mut nav: ResMut<NavigationState>,
    mut contexts: EguiContexts,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mouse_scroll: Res<AccumulatedMouseScroll>,
    windows: Query<&Window, With<PrimaryWindow>>,
    config: Res<Config>,
) {
    // Panels, the preview viewport and text fields own the pointer while hovered
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
        .unwrap_or(false);
    let Ok(window) = windows.single() else {
        return;
    };
    let (width, height) = (window.width().max(1.0), window.height().max(1.0));
    let delta = mouse_motion.delta;
    let trackball = rig.control_type() == ControlType::Trackball;

    if mouse_button.pressed(MouseButton::Left) && !egui_wants_pointer {
        if delta != Vec2::ZERO {
            if trackball {
                let step =
                    Vec2::new(delta.x, -delta.y) * config.trackball_rotate_speed / (width * 0.5);
                rig.trackball_rotate(step);
                nav.momentum = step;
            } else {
                rig.orbit(
                    delta.x * config.orbit_sensitivity,
                    delta.y * config.orbit_sensitivity,
                );
            }
        } else if trackball {
            nav.momentum = Vec2::ZERO;
        }
    } else if trackball && nav.momentum.length() > MOMENTUM_EPSILON {
        nav.momentum *= 1.0 - config.damping;
        let step = nav.momentum;
        rig.trackball_rotate(step);
    } else {
        nav.momentum = Vec2::ZERO;
    }

    if mouse_button.pressed(MouseButton::Right) && !egui_wants_pointer && delta != Vec2::ZERO {
        let scale = if trackball { config.pan_speed } else { 1.0 };
        rig.pan(delta * scale, height);
    }

    if !egui_wants_pointer && mouse_scroll.delta.y != 0.0 {
        let lines = match mouse_scroll.unit {
            MouseScrollUnit::Line => mouse_scroll.delta.y,
            MouseScrollUnit::Pixel => mouse_scroll.delta.y / PIXELS_PER_LINE,
        };
        rig.zoom(config.zoom_speed.powf(-lines));
    }
}

/// Drain the rig's event queue without marking the rig changed
fn dispatch_camera_events(
    mut rig: ResMut<MainCameraRig>,
    mut changes: MessageWriter<CameraChanged>,
) {
    for event in rig.bypass_change_detection().drain_events() {
        debug!(?event, "Camera event");
        changes.write(CameraChanged(event));
    }
}

fn sync_main_camera(
    rig: Res<MainCameraRig>,
    mut camera: Query<(&mut Transform, &mut Projection), With<MainCamera>>,
) {
    if !rig.is_changed() {
        return;
    }
    let Ok((mut transform, mut projection)) = camera.single_mut() else {
        return;
    };
    *transform = camera_transform(&rig);
    *projection = projection_for(&rig);
}

fn apply_theme(
    theme: Res<Theme>,
    mut clear_color: ResMut<ClearColor>,
    axes: Query<(&WorldAxis, &MeshMaterial3d<StandardMaterial>)>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !theme.is_changed() {
        return;
    }
    let colors = theme.colors();
    clear_color.0 = to_color(colors.bg);
    let axis_colors = [colors.axis_x, colors.axis_y, colors.axis_z];
    for (axis, material) in &axes {
        if let Some(material) = materials.get_mut(&material.0) {
            material.base_color = to_color(axis_colors[axis.axis.min(2)]);
        }
    }
}

fn update_axes_visibility(prefs: Res<Prefs>, mut axes: Query<&mut Visibility, With<WorldAxis>>) {
    if !prefs.is_changed() {
        return;
    }
    let visibility = if prefs.axes_visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    for mut axis in &mut axes {
        *axis = visibility;
    }
}
