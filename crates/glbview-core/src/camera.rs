//! Camera rig: pose, projection mode, saved camera slots and navigation
//!
//! The rig keeps the live pose in scene space (Y up) and the saved slots in
//! model space (Z up). Every mutation that observers care about pushes a
//! [`CameraEvent`]; the frontend drains them once per frame.

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::bounds::Aabb;
use crate::expr::evaluate_numeric_input;
use crate::framing::{face_preset, fit_orthographic, frame_perspective, Face, OrthoFrustum};
use crate::models::SceneBounds;
use crate::pose::{
    self, angles_to_direction, clamp_fov, direction_to_angles, model_to_scene, normalize_angle_deg,
    roll_from_up, scene_to_model, up_for_roll,
};

pub const DEFAULT_FOV_DEG: f32 = 20.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 1000.0;

/// Tolerance for slot dirty checks
pub const DIRTY_EPSILON: f32 = 1e-4;

/// Closest the camera may dolly toward its target
pub const MIN_DISTANCE: f32 = 1e-3;

/// Polar angle margin for orbit navigation
const ORBIT_POLE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    #[default]
    Perspective,
    Orthographic,
}

impl CameraMode {
    pub fn toggled(self) -> Self {
        match self {
            CameraMode::Perspective => CameraMode::Orthographic,
            CameraMode::Orthographic => CameraMode::Perspective,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    #[default]
    Orbit,
    Trackball,
}

impl ControlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::Orbit => "orbit",
            ControlType::Trackball => "trackball",
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orbit" => Ok(ControlType::Orbit),
            "trackball" => Ok(ControlType::Trackball),
            other => Err(format!("unknown control type: {}", other)),
        }
    }
}

/// A saved camera, in model space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSlot {
    #[serde(with = "pose::xyz")]
    pub pos: Vec3,
    #[serde(with = "pose::xyz")]
    pub target: Vec3,
    /// Degrees about the view axis
    #[serde(default)]
    pub roll: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_type: Option<ControlType>,
    #[serde(default)]
    pub mode: CameraMode,
}

/// Persisted form of all slots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraBundle {
    #[serde(default)]
    pub active_index: Option<i64>,
    #[serde(default)]
    pub cameras: Vec<Option<CameraSlot>>,
    #[serde(default)]
    pub slot_count: Option<i64>,
}

/// Notifications drained by the frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraEvent {
    PoseChanged,
    ModeChanged(CameraMode),
    ControlTypeChanged(ControlType),
    ActiveCameraChanged,
    /// Slots changed and should be written to storage
    SlotsChanged,
}

/// Last orthographic fit, kept so a resize can refit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoState {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub bounds: Aabb,
    pub frustum: OrthoFrustum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionState {
    Perspective { fov_deg: f32, near: f32, far: f32 },
    Orthographic(OrthoFrustum),
}

/// Text values of the camera editor fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraInputs {
    pub yaw: String,
    pub pitch: String,
    pub distance: String,
    pub target: [String; 3],
    pub roll: String,
    pub fov: String,
    pub roll_enabled: bool,
    pub fov_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CameraRig {
    position: Vec3,
    target: Vec3,
    up: Vec3,
    fov: f32,
    default_fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    mode: CameraMode,
    ortho: Option<OrthoState>,
    ortho_zoom: f32,

    pub bounds: SceneBounds,

    slots: Vec<Option<CameraSlot>>,
    slot_count: usize,
    active: usize,
    home: bool,
    dirty: bool,
    allow_roll: bool,
    control_type: ControlType,
    default_control_type: ControlType,
    baseline: Option<CameraSlot>,
    update_label: Option<String>,
    suppress_highlight: bool,
    applying: bool,

    events: Vec<CameraEvent>,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl CameraRig {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: DEFAULT_FOV_DEG,
            default_fov: DEFAULT_FOV_DEG,
            aspect: sanitize_aspect(aspect),
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            mode: CameraMode::Perspective,
            ortho: None,
            ortho_zoom: 1.0,
            bounds: SceneBounds::default(),
            slots: Vec::new(),
            slot_count: 0,
            active: 0,
            home: true,
            dirty: false,
            allow_roll: false,
            control_type: ControlType::Orbit,
            default_control_type: ControlType::Orbit,
            baseline: None,
            update_label: None,
            suppress_highlight: false,
            applying: false,
            events: Vec::new(),
        }
    }

    /// Override the defaults used for FOV and clip planes
    pub fn with_lens(mut self, fov_deg: f32, near: f32, far: f32) -> Self {
        self.default_fov = clamp_fov(fov_deg, DEFAULT_FOV_DEG);
        self.fov = self.default_fov;
        self.near = near;
        self.far = far;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn control_type(&self) -> ControlType {
        self.control_type
    }

    pub fn default_control_type(&self) -> ControlType {
        self.default_control_type
    }

    pub fn allow_roll(&self) -> bool {
        self.allow_roll
    }

    pub fn is_home(&self) -> bool {
        self.home
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn slot(&self, index: usize) -> Option<&CameraSlot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn active_slot(&self) -> Option<&CameraSlot> {
        self.slot(self.active)
    }

    pub fn ortho_state(&self) -> Option<&OrthoState> {
        self.ortho.as_ref()
    }

    /// Dirty flag as of the last refresh
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn drain_events(&mut self) -> Vec<CameraEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: CameraEvent) {
        if !self.events.contains(&event) {
            self.events.push(event);
        }
    }

    fn has_active_slot(&self) -> bool {
        self.active_slot().is_some()
    }

    /// Live pose as a slot, in model space
    pub fn current_state(&self) -> CameraSlot {
        CameraSlot {
            pos: scene_to_model(self.position),
            target: scene_to_model(self.target),
            roll: if self.allow_roll { self.roll_deg() } else { 0.0 },
            fov: Some(self.fov),
            control_type: Some(self.control_type),
            mode: self.mode,
        }
    }

    /// Signed roll of the live camera in degrees
    pub fn roll_deg(&self) -> f32 {
        roll_from_up(self.target - self.position, self.up)
    }

    /// Fit against the current up vector so a rolled view stays framed
    fn fit_ortho(&mut self, position: Vec3, target: Vec3) {
        if let Some(bounds) = self.bounds.frame_box(CameraMode::Orthographic) {
            let up = self.up;
            let frustum = fit_orthographic(&bounds, position, target, up, self.aspect);
            self.ortho = Some(OrthoState {
                position,
                target,
                up,
                bounds,
                frustum,
            });
            self.ortho_zoom = 1.0;
        }
    }

    /// Place the camera. Roll only applies while rolling is allowed.
    pub fn set_pose(&mut self, position: Vec3, target: Vec3, roll_deg: f32) {
        self.up = if self.allow_roll {
            up_for_roll(position, target, roll_deg)
        } else {
            Vec3::Y
        };
        self.position = position;
        self.target = target;
        self.fit_ortho(position, target);
        self.emit(CameraEvent::PoseChanged);
    }

    fn frame_target_box(&mut self) {
        if let Some(bounds) = self.bounds.target_box() {
            let framed = frame_perspective(&bounds, self.fov);
            self.position = framed.position;
            self.target = framed.target;
            if !self.allow_roll {
                self.up = Vec3::Y;
            }
        }
        let (position, target) = (self.position, self.target);
        self.fit_ortho(position, target);
        if self.control_type == ControlType::Trackball {
            self.set_pose(position, target, 0.0);
        }
    }

    /// Frame the model at the default FOV. Inside a slot the result is
    /// committed with the default control type.
    pub fn reset(&mut self) {
        self.fov = self.default_fov;
        self.frame_target_box();
        if !self.home && self.has_active_slot() {
            let next = self.default_control_type;
            self.switch_control_type(next);
            if let Some(Some(slot)) = self.slots.get_mut(self.active) {
                slot.control_type = Some(next);
            }
            self.commit_active();
        } else {
            self.refresh_dirty();
        }
        self.emit(CameraEvent::PoseChanged);
    }

    /// Frame the model and return to home mode
    pub fn reset_home(&mut self) {
        self.home = true;
        self.frame_target_box();
        self.dirty = false;
        self.emit(CameraEvent::PoseChanged);
        self.emit(CameraEvent::ActiveCameraChanged);
    }

    /// Compare against the baseline (or the active slot)
    pub fn is_dirty(&self) -> bool {
        let Some(saved) = self.baseline.as_ref().or_else(|| self.active_slot()) else {
            return false;
        };
        let current = self.current_state();
        let diff = |a: f32, b: f32| (a - b).abs() > DIRTY_EPSILON;
        let diff3 = |a: Vec3, b: Vec3| diff(a.x, b.x) || diff(a.y, b.y) || diff(a.z, b.z);
        let saved_fov = saved.fov.unwrap_or(self.fov);
        let current_fov = current.fov.unwrap_or(self.fov);
        let default_type = self.default_control_type;

        diff3(current.pos, saved.pos)
            || diff3(current.target, saved.target)
            || diff(current.roll, saved.roll)
            || diff(current_fov, saved_fov)
            || current.control_type.unwrap_or(default_type) != saved.control_type.unwrap_or(default_type)
            || current.mode != saved.mode
    }

    /// Recompute the dirty flag after a live edit
    pub fn refresh_dirty(&mut self) {
        if self.baseline.is_none() && (self.home || !self.has_active_slot()) {
            return;
        }
        self.dirty = self.is_dirty();
    }

    /// Store the live pose into the active slot
    pub fn commit_active(&mut self) {
        if !self.has_active_slot() {
            return;
        }
        let state = self.current_state();
        self.slots[self.active] = Some(state);
        self.dirty = false;
        self.emit(CameraEvent::SlotsChanged);
    }

    /// Compare against `baseline` instead of the active slot
    pub fn set_baseline(&mut self, baseline: Option<CameraSlot>) {
        self.baseline = baseline;
        self.refresh_dirty();
    }

    pub fn set_update_label(&mut self, label: Option<String>) {
        self.update_label = label;
    }

    pub fn set_suppress_highlight(&mut self, suppress: bool) {
        self.suppress_highlight = suppress;
    }

    /// Label for the update action, `None` while it is hidden
    pub fn update_button_label(&self) -> Option<String> {
        if self.baseline.is_none() && (self.home || !self.has_active_slot()) {
            return None;
        }
        if !self.dirty {
            return None;
        }
        Some(
            self.update_label
                .clone()
                .unwrap_or_else(|| format!("Update Camera {}", self.active + 1)),
        )
    }

    pub fn remove_enabled(&self) -> bool {
        !self.home && self.has_active_slot() && self.slot_count > 1
    }

    pub fn mode_label(&self) -> &'static str {
        let mode = self.active_slot().map_or(self.mode, |s| s.mode);
        match mode {
            CameraMode::Orthographic => "Camera: Ortho",
            CameraMode::Perspective => "Camera: Perspective",
        }
    }

    /// Whether slot `index` is drawn as the selected one
    pub fn slot_highlighted(&self, index: usize) -> bool {
        !self.home && index == self.active && !self.suppress_highlight
    }

    /// Aim at the model center, keeping the position
    pub fn target_to_model_center(&mut self, persist: bool) {
        let roll = self.roll_deg();
        self.target = self.bounds.model_center();
        if self.allow_roll {
            self.up = up_for_roll(self.position, self.target, roll);
        }
        let (position, target) = (self.position, self.target);
        self.fit_ortho(position, target);
        if persist && !self.home && self.has_active_slot() {
            self.commit_active();
        } else {
            self.refresh_dirty();
        }
        self.emit(CameraEvent::PoseChanged);
    }

    /// Look straight at one face of the model
    pub fn apply_preset(&mut self, face: Face) {
        let Some(bounds) = self.bounds.target_box() else {
            return;
        };
        let Some(pose) = face_preset(&bounds, face, self.fov, self.aspect) else {
            return;
        };
        let was_home = self.home;
        if !was_home {
            self.ensure_slot(self.active);
        }
        self.set_pose(pose.position, pose.target, 0.0);
        if !was_home {
            self.commit_active();
        }
    }

    /// Capture the live pose into `index` if that slot is empty
    pub fn ensure_slot(&mut self, index: usize) {
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        if self.slots[index].is_none() {
            self.slots[index] = Some(self.current_state());
        }
    }

    fn switch_control_type(&mut self, next: ControlType) {
        if next != self.control_type {
            self.control_type = next;
            self.emit(CameraEvent::ControlTypeChanged(next));
        }
        let allow_roll = next == ControlType::Trackball;
        if allow_roll != self.allow_roll {
            self.set_roll_enabled(allow_roll);
        }
    }

    fn apply_state(&mut self, state: &CameraSlot) {
        self.switch_control_type(state.control_type.unwrap_or(self.default_control_type));
        self.home = false;
        self.applying = true;
        self.set_mode(state.mode);
        self.set_pose(model_to_scene(state.pos), model_to_scene(state.target), state.roll);
        if state.mode == CameraMode::Perspective {
            let fov = state.fov.filter(|f| f.is_finite()).unwrap_or(self.default_fov);
            self.fov = clamp_fov(fov, self.default_fov);
        }
        self.applying = false;
    }

    /// Move the camera to a saved slot and persist the selection
    pub fn apply_slot(&mut self, index: usize) {
        let Some(state) = self.slot(index).cloned() else {
            return;
        };
        self.apply_state(&state);
        self.dirty = false;
        self.emit(CameraEvent::SlotsChanged);
        self.emit(CameraEvent::ActiveCameraChanged);
    }

    /// Show a pose that is not owned by any slot (keyframe previews)
    pub fn apply_external_state(&mut self, state: &CameraSlot) {
        self.apply_state(state);
        self.refresh_dirty();
    }

    /// Click on a slot button. An empty slot captures the live pose first.
    pub fn select_slot(&mut self, index: usize) {
        self.home = false;
        self.ensure_slot(index);
        self.active = index;
        if index >= self.slot_count {
            self.slot_count = index + 1;
        }
        self.apply_slot(index);
    }

    /// Append a slot holding the live pose and make it active
    pub fn add_slot(&mut self) {
        let next = self.slot_count;
        let state = self.current_state();
        if self.slots.len() <= next {
            self.slots.resize(next + 1, None);
        }
        self.slots[next] = Some(state);
        self.slot_count += 1;
        self.active = next;
        self.home = false;
        self.dirty = false;
        debug!(slot = next + 1, "Added camera slot");
        self.emit(CameraEvent::SlotsChanged);
        self.emit(CameraEvent::ActiveCameraChanged);
    }

    /// Delete the active slot. At least one slot always remains.
    pub fn remove_active_slot(&mut self) {
        if self.slot_count <= 1 {
            return;
        }
        if self.active < self.slots.len() {
            self.slots.remove(self.active);
        }
        self.slot_count = (self.slot_count - 1).max(1);
        if self.active >= self.slot_count {
            self.active = self.slot_count - 1;
        }
        self.home = false;
        self.ensure_slot(self.active);
        self.apply_slot(self.active);
    }

    /// Switch projection. Orthographic refits to the framing box; returning
    /// to perspective restores the slot FOV.
    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        match mode {
            CameraMode::Orthographic => {
                let (position, target) = (self.position, self.target);
                self.fit_ortho(position, target);
            }
            CameraMode::Perspective => {
                let saved = self.active_slot().and_then(|s| s.fov).filter(|f| f.is_finite());
                self.fov = clamp_fov(saved.unwrap_or(self.default_fov), self.default_fov);
            }
        }
        self.emit(CameraEvent::PoseChanged);
        if !self.applying {
            self.emit(CameraEvent::ModeChanged(mode));
            self.refresh_dirty();
        }
    }

    /// Toolbar toggle: flip the projection and keep the active slot in sync
    pub fn toggle_mode(&mut self) {
        self.set_mode(self.mode.toggled());
        if !self.home && self.has_active_slot() {
            self.commit_active();
        }
    }

    /// Change the control type stored in the active slot
    pub fn set_control_type_active(&mut self, control_type: ControlType) {
        if self.home || !self.has_active_slot() {
            return;
        }
        if let Some(Some(slot)) = self.slots.get_mut(self.active) {
            slot.control_type = Some(control_type);
        }
        self.control_type = control_type;
        self.emit(CameraEvent::ControlTypeChanged(control_type));
        let allow_roll = control_type == ControlType::Trackball;
        if allow_roll != self.allow_roll {
            self.set_roll_enabled(allow_roll);
        }
        self.emit(CameraEvent::SlotsChanged);
        self.refresh_dirty();
    }

    pub fn set_default_control_type(&mut self, control_type: ControlType) {
        self.default_control_type = control_type;
    }

    /// Disabling roll levels the camera
    pub fn set_roll_enabled(&mut self, enabled: bool) {
        self.allow_roll = enabled;
        if !enabled {
            let (position, target) = (self.position, self.target);
            self.set_pose(position, target, 0.0);
            self.refresh_dirty();
        }
    }

    /// Viewport resize
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = sanitize_aspect(aspect);
        if self.mode == CameraMode::Orthographic {
            if let Some(state) = self.ortho.as_mut() {
                state.frustum =
                    fit_orthographic(&state.bounds, state.position, state.target, state.up, self.aspect);
            }
        }
    }

    pub fn projection(&self) -> ProjectionState {
        match self.mode {
            CameraMode::Perspective => ProjectionState::Perspective {
                fov_deg: self.fov,
                near: self.near,
                far: self.far,
            },
            CameraMode::Orthographic => {
                let frustum = self.ortho.map(|o| o.frustum).unwrap_or_default();
                ProjectionState::Orthographic(frustum.zoomed(self.ortho_zoom))
            }
        }
    }

    /// Editor field values for the live pose
    pub fn inputs(&self) -> CameraInputs {
        let pos = scene_to_model(self.position);
        let target = scene_to_model(self.target);
        let (yaw, pitch) = direction_to_angles(pos - target);
        let roll = if self.allow_roll { self.roll_deg() } else { 0.0 };
        CameraInputs {
            yaw: format!("{:.2}", yaw),
            pitch: format!("{:.2}", pitch),
            distance: format!("{:.3}", pos.distance(target)),
            target: [
                format!("{:.3}", target.x),
                format!("{:.3}", target.y),
                format!("{:.3}", target.z),
            ],
            roll: format!("{:.2}", normalize_angle_deg(roll)),
            fov: format!("{:.1}", self.fov),
            roll_enabled: self.allow_roll,
            fov_enabled: self.mode == CameraMode::Perspective,
        }
    }

    fn eval_target(&self, inputs: &CameraInputs, current: Vec3) -> Vec3 {
        Vec3::new(
            evaluate_numeric_input(&inputs.target[0], current.x),
            evaluate_numeric_input(&inputs.target[1], current.y),
            evaluate_numeric_input(&inputs.target[2], current.z),
        )
    }

    fn persist_or_refresh(&mut self) {
        if !self.home && self.has_active_slot() {
            self.commit_active();
        } else {
            self.refresh_dirty();
        }
    }

    /// Apply every editor field. Yaw and pitch must evaluate; a missing
    /// distance keeps the current one.
    pub fn apply_inputs(&mut self, inputs: &CameraInputs) {
        let current_target = scene_to_model(self.target);
        let current_pos = scene_to_model(self.position);
        let (current_yaw, current_pitch) = direction_to_angles(current_pos - current_target);
        let current_distance = current_pos.distance(current_target);

        let target = self.eval_target(inputs, current_target);
        let yaw = evaluate_numeric_input(&inputs.yaw, current_yaw);
        let pitch = evaluate_numeric_input(&inputs.pitch, current_pitch);
        let distance_value = evaluate_numeric_input(&inputs.distance, current_distance);
        let roll = if self.allow_roll {
            evaluate_numeric_input(&inputs.roll, self.roll_deg())
        } else {
            0.0
        };
        let fov = evaluate_numeric_input(&inputs.fov, self.fov);

        let distance = if distance_value.is_finite() {
            distance_value.max(0.0)
        } else {
            current_distance
        };
        if !yaw.is_finite() || !pitch.is_finite() {
            return;
        }
        let perspective = self.mode == CameraMode::Perspective;
        if !target.is_finite() || !distance.is_finite() || !roll.is_finite() || (perspective && !fov.is_finite()) {
            return;
        }

        let position = target + angles_to_direction(yaw, pitch) * distance;
        self.set_pose(model_to_scene(position), model_to_scene(target), roll);
        if perspective {
            self.fov = fov.clamp(pose::MIN_FOV_DEG, pose::MAX_FOV_DEG);
        }
        self.persist_or_refresh();
    }

    /// Apply only a distance edit along the current yaw and pitch
    pub fn apply_distance_input(&mut self, inputs: &CameraInputs) {
        let current_target = scene_to_model(self.target);
        let current_pos = scene_to_model(self.position);
        let (current_yaw, current_pitch) = direction_to_angles(current_pos - current_target);
        let current_distance = current_pos.distance(current_target);

        let distance = evaluate_numeric_input(&inputs.distance, current_distance);
        if !distance.is_finite() || distance < 0.0 {
            return;
        }
        let target = self.eval_target(inputs, current_target);
        if !target.is_finite() {
            return;
        }
        let yaw = evaluate_numeric_input(&inputs.yaw, current_yaw);
        let pitch = evaluate_numeric_input(&inputs.pitch, current_pitch);
        if !yaw.is_finite() || !pitch.is_finite() {
            return;
        }

        let position = target + angles_to_direction(yaw, pitch) * distance;
        let roll = if self.allow_roll {
            let value = evaluate_numeric_input(&inputs.roll, self.roll_deg());
            if value.is_finite() {
                value
            } else {
                0.0
            }
        } else {
            0.0
        };
        self.set_pose(model_to_scene(position), model_to_scene(target), roll);
        self.persist_or_refresh();
        self.emit(CameraEvent::PoseChanged);
    }

    /// Load saved slots and enter home mode. Returns whether anything was saved.
    pub fn init_slots(&mut self, bundle: Option<CameraBundle>) -> bool {
        let mut has_saved = false;
        if let Some(bundle) = bundle {
            self.slots = bundle.cameras;
            self.slot_count = match bundle.slot_count {
                Some(count) if count > 0 => count as usize,
                _ => self.slots.len(),
            };
            if let Some(index) = bundle.active_index {
                let max = self.slot_count.saturating_sub(1) as i64;
                self.active = index.clamp(0, max) as usize;
            }
            has_saved = !self.slots.is_empty();
        }
        self.home = true;
        if !has_saved {
            self.slot_count = 0;
            self.slots.clear();
            self.active = 0;
        }
        let default_type = self.default_control_type;
        self.switch_control_type(default_type);
        self.dirty = false;
        self.emit(CameraEvent::ActiveCameraChanged);
        has_saved
    }

    pub fn to_bundle(&self) -> CameraBundle {
        CameraBundle {
            active_index: Some(self.active as i64),
            cameras: self.slots.clone(),
            slot_count: Some(self.slot_count as i64),
        }
    }

    /// Orbit about the target. Positive deltas turn left and up.
    pub fn orbit(&mut self, delta_azimuth: f32, delta_polar: f32) {
        let offset = self.position - self.target;
        let radius = offset.length();
        if radius < MIN_DISTANCE {
            return;
        }
        let theta = offset.x.atan2(offset.z) - delta_azimuth;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() - delta_polar)
            .clamp(ORBIT_POLE_EPSILON, std::f32::consts::PI - ORBIT_POLE_EPSILON);
        let sin_phi = phi.sin();
        let offset = Vec3::new(sin_phi * theta.sin(), phi.cos(), sin_phi * theta.cos()) * radius;
        self.position = self.target + offset;
        if !self.allow_roll {
            self.up = Vec3::Y;
        }
        self.controls_changed();
    }

    /// Free rotation that carries the up vector along (rolls the view)
    pub fn trackball_rotate(&mut self, delta: Vec2) {
        let angle = delta.length();
        if !(angle > 1e-9) {
            return;
        }
        let eye = self.position - self.target;
        let eye_dir = eye.normalize_or_zero();
        let up_dir = self.up.normalize_or_zero();
        let side = up_dir.cross(eye_dir).normalize_or_zero();
        let move_dir = up_dir * delta.y + side * delta.x;
        let axis = move_dir.cross(eye).normalize_or_zero();
        if axis == Vec3::ZERO {
            return;
        }
        let rotation = Quat::from_axis_angle(axis, angle);
        let eye = rotation * eye;
        self.position = self.target + eye;
        let up = rotation * self.up;
        let view = -eye.normalize_or_zero();
        self.up = (up - view * up.dot(view)).normalize_or(Vec3::Y);
        self.controls_changed();
    }

    /// Shift position and target in the view plane by a pixel delta
    pub fn pan(&mut self, delta_px: Vec2, viewport_height: f32) {
        if !(viewport_height > 0.0) {
            return;
        }
        let offset = self.position - self.target;
        let world_per_px = match self.projection() {
            ProjectionState::Perspective { fov_deg, .. } => {
                2.0 * offset.length() * (fov_deg.to_radians() / 2.0).tan() / viewport_height
            }
            ProjectionState::Orthographic(frustum) => frustum.height() / viewport_height,
        };
        let forward = (-offset).normalize_or_zero();
        let right = forward.cross(self.up).normalize_or_zero();
        let cam_up = right.cross(forward);
        let shift = (-right * delta_px.x + cam_up * delta_px.y) * world_per_px;
        self.position += shift;
        self.target += shift;
        self.controls_changed();
    }

    /// Dolly by `scale` (>1 moves away). Orthographic mode zooms the frustum.
    pub fn zoom(&mut self, scale: f32) {
        if !(scale.is_finite() && scale > 0.0) {
            return;
        }
        match self.mode {
            CameraMode::Perspective => {
                let offset = self.position - self.target;
                let distance = (offset.length() * scale).max(MIN_DISTANCE);
                self.position = self.target + offset.normalize_or(Vec3::Z) * distance;
            }
            CameraMode::Orthographic => {
                self.ortho_zoom = (self.ortho_zoom / scale).clamp(0.01, 1000.0);
            }
        }
        self.controls_changed();
    }

    /// Called after interactive navigation moved the camera
    pub fn controls_changed(&mut self) {
        if self.applying {
            return;
        }
        self.refresh_dirty();
        self.emit(CameraEvent::PoseChanged);
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> SceneBounds {
        SceneBounds {
            reference: None,
            visible: Some(Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))),
        }
    }

    fn rig_with_slot() -> CameraRig {
        let mut rig = CameraRig::new(1.5);
        rig.bounds = unit_bounds();
        rig.init_slots(None);
        rig.reset_home();
        rig.add_slot();
        rig.drain_events();
        rig
    }

    #[test]
    fn test_reset_frames_model() {
        let mut rig = CameraRig::new(1.0);
        rig.bounds = unit_bounds();
        rig.reset();
        assert_eq!(rig.target(), Vec3::ZERO);
        assert_eq!(rig.fov(), DEFAULT_FOV_DEG);
        let expected = 2.0 / (2.0 * 10f32.to_radians().tan()) * 1.25;
        assert!((rig.position().length() - expected).abs() < 1e-3);
        assert!(rig.ortho_state().is_some());
        assert!(rig.drain_events().contains(&CameraEvent::PoseChanged));
    }

    #[test]
    fn test_dirty_after_commit_and_change() {
        let mut rig = rig_with_slot();
        rig.refresh_dirty();
        assert!(!rig.is_dirty());
        assert!(rig.update_button_label().is_none());

        rig.orbit(0.3, 0.1);
        assert!(rig.dirty());
        assert_eq!(rig.update_button_label().as_deref(), Some("Update Camera 1"));

        rig.commit_active();
        assert!(!rig.is_dirty());
        assert!(!rig.dirty());
        assert!(rig.drain_events().contains(&CameraEvent::SlotsChanged));

        // Tiny movements stay below epsilon
        rig.pan(Vec2::new(1e-7, 0.0), 800.0);
        assert!(!rig.is_dirty());
    }

    #[test]
    fn test_home_mode_is_transient() {
        let mut rig = rig_with_slot();
        rig.reset_home();
        rig.orbit(0.5, 0.0);
        assert!(!rig.dirty());
        assert!(rig.update_button_label().is_none());
        assert!(!rig.remove_enabled());
    }

    #[test]
    fn test_baseline_overrides_slot() {
        let mut rig = rig_with_slot();
        rig.reset_home();
        let mut baseline = rig.current_state();
        baseline.pos.x += 1.0;
        rig.set_baseline(Some(baseline));
        assert!(rig.dirty());
        rig.set_update_label(Some("Update Keyframe 2".into()));
        assert_eq!(rig.update_button_label().as_deref(), Some("Update Keyframe 2"));
    }

    #[test]
    fn test_remove_last_slot_is_noop() {
        let mut rig = rig_with_slot();
        assert_eq!(rig.slot_count(), 1);
        assert!(!rig.remove_enabled());
        rig.remove_active_slot();
        assert_eq!(rig.slot_count(), 1);
        assert!(rig.active_slot().is_some());
    }

    #[test]
    fn test_remove_active_slot_clamps_index() {
        let mut rig = rig_with_slot();
        rig.orbit(0.4, 0.0);
        rig.add_slot();
        rig.orbit(0.4, 0.0);
        rig.add_slot();
        assert_eq!(rig.slot_count(), 3);
        assert_eq!(rig.active_index(), 2);
        assert!(rig.remove_enabled());

        let second = rig.slot(1).cloned().unwrap();
        rig.remove_active_slot();
        assert_eq!(rig.slot_count(), 2);
        assert_eq!(rig.active_index(), 1);
        let pos = scene_to_model(rig.position());
        assert!((pos - second.pos).length() < 1e-4);
        assert!(!rig.is_home());
    }

    #[test]
    fn test_select_empty_slot_captures_pose() {
        let mut rig = CameraRig::new(1.0);
        rig.bounds = unit_bounds();
        let bundle = CameraBundle {
            active_index: Some(0),
            cameras: vec![None, None],
            slot_count: Some(2),
        };
        assert!(rig.init_slots(Some(bundle)));
        assert!(rig.is_home());
        let before = rig.current_state();
        rig.select_slot(1);
        assert_eq!(rig.active_index(), 1);
        assert!(!rig.is_home());
        let saved = rig.slot(1).unwrap();
        assert!((saved.pos - before.pos).length() < 1e-5);
        let events = rig.drain_events();
        assert!(events.contains(&CameraEvent::ActiveCameraChanged));
        assert!(events.contains(&CameraEvent::SlotsChanged));
    }

    #[test]
    fn test_init_slots_clamps_and_falls_back() {
        let mut rig = CameraRig::new(1.0);
        let slot = rig.current_state();
        let bundle = CameraBundle {
            active_index: Some(9),
            cameras: vec![Some(slot.clone()), Some(slot)],
            slot_count: Some(0),
        };
        assert!(rig.init_slots(Some(bundle)));
        assert_eq!(rig.slot_count(), 2);
        assert_eq!(rig.active_index(), 1);

        let mut rig = CameraRig::new(1.0);
        assert!(!rig.init_slots(Some(CameraBundle::default())));
        assert_eq!(rig.slot_count(), 0);
        assert!(!rig.init_slots(None));
    }

    #[test]
    fn test_bundle_json_shape() {
        let json = r#"{"activeIndex":1,"cameras":[null,{"pos":{"x":1,"y":2,"z":3},"target":{"x":0,"y":0,"z":0},"controlType":"trackball","mode":"orthographic"}],"slotCount":2}"#;
        let bundle: CameraBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.active_index, Some(1));
        let slot = bundle.cameras[1].as_ref().unwrap();
        assert_eq!(slot.pos, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(slot.roll, 0.0);
        assert_eq!(slot.control_type, Some(ControlType::Trackball));
        assert_eq!(slot.mode, CameraMode::Orthographic);

        let out = serde_json::to_value(&bundle).unwrap();
        assert_eq!(out["slotCount"], 2);
        assert_eq!(out["cameras"][1]["controlType"], "trackball");
        assert!(out["cameras"][0].is_null());
    }

    #[test]
    fn test_apply_slot_restores_mode_and_control() {
        let mut rig = CameraRig::new(1.0);
        rig.bounds = unit_bounds();
        let slot = CameraSlot {
            pos: Vec3::new(0.0, -10.0, 0.0),
            target: Vec3::ZERO,
            roll: 30.0,
            fov: Some(35.0),
            control_type: Some(ControlType::Trackball),
            mode: CameraMode::Perspective,
        };
        let bundle = CameraBundle {
            active_index: Some(0),
            cameras: vec![Some(slot)],
            slot_count: Some(1),
        };
        rig.init_slots(Some(bundle));
        rig.drain_events();
        rig.apply_slot(0);
        assert_eq!(rig.control_type(), ControlType::Trackball);
        assert!(rig.allow_roll());
        assert!((rig.roll_deg() - 30.0).abs() < 1e-3);
        assert_eq!(rig.fov(), 35.0);
        assert!(!rig.dirty());
        let events = rig.drain_events();
        assert!(events.contains(&CameraEvent::ControlTypeChanged(ControlType::Trackball)));
        // Applying a slot does not announce a user mode switch
        assert!(!events.iter().any(|e| matches!(e, CameraEvent::ModeChanged(_))));
    }

    #[test]
    fn test_roll_requires_trackball() {
        let mut rig = CameraRig::new(1.0);
        rig.set_pose(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 45.0);
        assert_eq!(rig.up(), Vec3::Y);
        assert!(rig.roll_deg().abs() < 1e-4);

        rig.set_roll_enabled(true);
        rig.set_pose(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 45.0);
        assert!((rig.roll_deg() - 45.0).abs() < 1e-3);

        rig.set_roll_enabled(false);
        assert!(rig.roll_deg().abs() < 1e-4);
    }

    #[test]
    fn test_mode_switch_and_label() {
        let mut rig = CameraRig::new(2.0);
        rig.bounds = unit_bounds();
        rig.reset();
        assert_eq!(rig.mode_label(), "Camera: Perspective");
        rig.set_mode(CameraMode::Orthographic);
        assert_eq!(rig.mode_label(), "Camera: Ortho");
        match rig.projection() {
            ProjectionState::Orthographic(frustum) => {
                assert!((frustum.width() / frustum.height() - 2.0).abs() < 1e-3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(rig.drain_events().contains(&CameraEvent::ModeChanged(CameraMode::Orthographic)));

        rig.set_aspect(0.5);
        match rig.projection() {
            ProjectionState::Orthographic(frustum) => {
                assert!((frustum.width() / frustum.height() - 0.5).abs() < 1e-3);
            }
            other => panic!("unexpected {:?}", other),
        }
        rig.set_mode(CameraMode::Perspective);
        assert_eq!(rig.fov(), DEFAULT_FOV_DEG);
    }

    fn assert_frames_box(rig: &CameraRig, bounds: &Aabb) {
        let ProjectionState::Orthographic(frustum) = rig.projection() else {
            panic!("expected orthographic projection");
        };
        let view = glam::Mat4::look_at_rh(rig.position(), rig.target(), rig.up());
        for corner in bounds.corners() {
            let p = view.transform_point3(corner);
            assert!(p.x >= frustum.left - 1e-3 && p.x <= frustum.right + 1e-3, "x {} outside", p.x);
            assert!(p.y >= frustum.bottom - 1e-3 && p.y <= frustum.top + 1e-3, "y {} outside", p.y);
        }
    }

    #[test]
    fn test_ortho_fit_follows_roll() {
        let bounds = Aabb::new(Vec3::new(-10.0, -1.0, -1.0), Vec3::new(10.0, 1.0, 1.0));
        let mut rig = CameraRig::new(4.0);
        rig.bounds = SceneBounds {
            reference: None,
            visible: Some(bounds),
        };
        rig.set_roll_enabled(true);
        rig.set_pose(Vec3::new(0.0, 0.0, 50.0), Vec3::ZERO, 90.0);
        rig.set_mode(CameraMode::Orthographic);
        assert!((rig.roll_deg() - 90.0).abs() < 1e-3);
        assert_frames_box(&rig, &bounds);

        rig.set_aspect(0.25);
        assert_frames_box(&rig, &bounds);

        rig.set_pose(Vec3::new(30.0, 20.0, 40.0), Vec3::ZERO, -35.0);
        assert_frames_box(&rig, &bounds);
    }

    #[test]
    fn test_apply_inputs() {
        let mut rig = rig_with_slot();
        let mut inputs = rig.inputs();
        inputs.yaw = "90".into();
        inputs.pitch = "0".into();
        inputs.distance = "10".into();
        inputs.target = ["0".into(), "0".into(), "0".into()];
        inputs.fov = "x * 2".into();
        rig.apply_inputs(&inputs);

        let pos = scene_to_model(rig.position());
        assert!((pos - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
        assert!((rig.fov() - 40.0).abs() < 1e-4);
        // Committed to the active slot
        assert!(!rig.dirty());
        assert!((rig.active_slot().unwrap().pos - pos).length() < 1e-5);

        let shown = rig.inputs();
        assert_eq!(shown.yaw, "90.00");
        assert_eq!(shown.distance, "10.000");
        assert_eq!(shown.fov, "40.0");
        assert_eq!(shown.roll, "0.00");
        assert!(!shown.roll_enabled);

        // Missing yaw is rejected
        inputs.yaw = "".into();
        inputs.distance = "3".into();
        rig.apply_inputs(&inputs);
        assert!((scene_to_model(rig.position()) - pos).length() < 1e-4);
    }

    #[test]
    fn test_apply_distance_input() {
        let mut rig = rig_with_slot();
        let before = rig.inputs();
        let mut inputs = before.clone();
        inputs.distance = "-1".into();
        rig.apply_distance_input(&inputs);
        assert_eq!(rig.inputs().distance, before.distance);

        inputs.distance = "v / 2".into();
        rig.apply_distance_input(&inputs);
        let old: f32 = before.distance.parse().unwrap();
        let new: f32 = rig.inputs().distance.parse().unwrap();
        assert!((new - old / 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_face_preset_commits() {
        let mut rig = rig_with_slot();
        rig.apply_preset(Face::Front);
        let offset = rig.position() - rig.target();
        assert!(offset.x.abs() < 1e-5 && offset.y.abs() < 1e-5 && offset.z > 0.0);
        assert!(!rig.dirty());
    }

    #[test]
    fn test_target_to_model_center() {
        let mut rig = rig_with_slot();
        rig.pan(Vec2::new(50.0, 20.0), 600.0);
        assert!(rig.target().length() > 1e-3);
        rig.target_to_model_center(false);
        assert_eq!(rig.target(), Vec3::ZERO);
        assert!(rig.dirty());
        rig.target_to_model_center(true);
        assert!(!rig.dirty());
    }

    #[test]
    fn test_control_type_ignored_in_home() {
        let mut rig = CameraRig::new(1.0);
        rig.init_slots(None);
        rig.set_control_type_active(ControlType::Trackball);
        assert_eq!(rig.control_type(), ControlType::Orbit);

        let mut rig = rig_with_slot();
        rig.set_control_type_active(ControlType::Trackball);
        assert_eq!(rig.control_type(), ControlType::Trackball);
        assert_eq!(rig.active_slot().unwrap().control_type, Some(ControlType::Trackball));
    }

    #[test]
    fn test_reset_applies_default_control_type() {
        let mut rig = rig_with_slot();
        rig.set_control_type_active(ControlType::Trackball);
        rig.set_default_control_type(ControlType::Orbit);
        rig.reset();
        assert_eq!(rig.control_type(), ControlType::Orbit);
        assert_eq!(rig.active_slot().unwrap().control_type, Some(ControlType::Orbit));
        assert!(!rig.dirty());
    }

    #[test]
    fn test_navigation_keeps_distance() {
        let mut rig = rig_with_slot();
        let before = rig.position().distance(rig.target());
        rig.orbit(1.0, -0.4);
        assert!((rig.position().distance(rig.target()) - before).abs() < 1e-3);

        rig.set_roll_enabled(true);
        rig.trackball_rotate(Vec2::new(0.2, 0.3));
        assert!((rig.position().distance(rig.target()) - before).abs() < 1e-3);
        assert!(rig.up().dot((rig.target() - rig.position()).normalize()).abs() < 1e-4);

        rig.zoom(2.0);
        assert!((rig.position().distance(rig.target()) - before * 2.0).abs() < 1e-3);
    }
}
