//! Ambient, directional and spot lights
//!
//! Light positions and targets live in model space. [`LightRig`] owns the
//! live lights and the editor logic; [`LightState`] is the serialized form
//! used by settings bundles and keyframe interpolation.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_3;
use tracing::debug;

use crate::color::{lerp_hsl, HexColor};
use crate::expr::evaluate_numeric_input;
use crate::pose::{self, angles_to_direction, direction_to_angles, scene_to_model};

/// Offset from the model center for lights without a position
pub const DEFAULT_LIGHT_OFFSET: Vec3 = Vec3::new(10.0, 10.0, 10.0);
pub const DEFAULT_RANGE: f32 = 30.0;
pub const DEFAULT_SPOT_ANGLE: f32 = FRAC_PI_3;
pub const DEFAULT_SPOT_DECAY: f32 = 2.0;
/// Decay assumed by interpolation when an entry has none
pub const INTERPOLATION_DECAY: f32 = 1.0;
/// Intensity of the light added on first load and on reset
pub const DEFAULT_LIGHT_INTENSITY: f32 = 1.5;
pub const LIGHT_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    #[default]
    Directional,
    Spot,
}

impl LightKind {
    pub fn label(&self) -> &'static str {
        match self {
            LightKind::Directional => "Directional",
            LightKind::Spot => "Spot",
        }
    }
}

fn default_intensity() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientState {
    #[serde(default)]
    pub color: HexColor,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

impl Default for AmbientState {
    fn default() -> Self {
        Self {
            color: HexColor::WHITE,
            intensity: 1.0,
        }
    }
}

/// Serialized light. Spot-only fields are omitted for directional lights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightEntry {
    #[serde(rename = "type", default)]
    pub kind: LightKind,
    #[serde(default)]
    pub color: HexColor,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default, with = "pose::xyz::option", skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, with = "pose::xyz::option", skip_serializing_if = "Option::is_none")]
    pub target_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<f32>,
    /// Cone half angle in radians
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penumbra: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay: Option<f32>,
}

impl Default for LightEntry {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            color: HexColor::WHITE,
            intensity: 1.0,
            position: None,
            target_position: None,
            distance: None,
            range: None,
            angle: None,
            penumbra: None,
            decay: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambient: Option<AmbientState>,
    #[serde(default)]
    pub directional: Vec<LightEntry>,
}

/// Fill in defaults for a possibly missing or partial state
pub fn normalize_light_state(state: Option<&LightState>) -> LightState {
    let Some(state) = state else {
        return LightState {
            ambient: Some(AmbientState::default()),
            directional: Vec::new(),
        };
    };
    let ambient = state.ambient.unwrap_or_default();
    LightState {
        ambient: Some(AmbientState {
            color: ambient.color,
            intensity: finite_or(ambient.intensity, 1.0),
        }),
        directional: state
            .directional
            .iter()
            .map(|entry| LightEntry {
                intensity: finite_or(entry.intensity, 1.0),
                distance: entry.distance.filter(|v| v.is_finite()),
                range: entry.range.filter(|v| v.is_finite()),
                angle: entry.angle.filter(|v| v.is_finite()),
                penumbra: entry.penumbra.filter(|v| v.is_finite()),
                decay: entry.decay.filter(|v| v.is_finite()),
                ..entry.clone()
            })
            .collect(),
    }
}

/// Whether two entries match within [`LIGHT_EPSILON`]
pub fn entries_equal(a: Option<&LightEntry>, b: Option<&LightEntry>) -> bool {
    let (a, b) = match (a, b) {
        (None, None) => return true,
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };
    let diff = |x: f32, y: f32| (x - y).abs() > LIGHT_EPSILON;
    let diff_opt = |x: Option<f32>, y: Option<f32>| diff(x.unwrap_or(0.0), y.unwrap_or(0.0));
    let diff_vec = |x: Option<Vec3>, y: Option<Vec3>| match (x, y) {
        (None, None) => false,
        (Some(x), Some(y)) => diff(x.x, y.x) || diff(x.y, y.y) || diff(x.z, y.z),
        _ => true,
    };
    a.kind == b.kind
        && a.color == b.color
        && !diff(a.intensity, b.intensity)
        && !diff_vec(a.position, b.position)
        && !diff_opt(a.distance, b.distance)
        && !diff_opt(a.range, b.range)
        && !diff_opt(a.angle, b.angle)
        && !diff_opt(a.penumbra, b.penumbra)
        && !diff_opt(a.decay, b.decay)
        && !diff_vec(a.target_position, b.target_position)
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

fn format_target(target: Vec3) -> [String; 3] {
    [
        format!("{:.3}", target.x),
        format!("{:.3}", target.y),
        format!("{:.3}", target.z),
    ]
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Options for [`LightRig::add_light`]; `None` picks the default
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightOptions {
    pub kind: LightKind,
    pub color: Option<HexColor>,
    pub intensity: Option<f32>,
    pub position: Option<Vec3>,
    pub target_position: Option<Vec3>,
    pub distance: Option<f32>,
    pub range: Option<f32>,
    pub angle: Option<f32>,
    pub penumbra: Option<f32>,
    pub decay: Option<f32>,
}

impl From<&LightEntry> for LightOptions {
    fn from(entry: &LightEntry) -> Self {
        Self {
            kind: entry.kind,
            color: Some(entry.color),
            intensity: Some(finite_or(entry.intensity, 1.0)),
            position: entry.position.filter(|p| p.is_finite()),
            target_position: entry.target_position.filter(|p| p.is_finite()),
            distance: finite(entry.distance),
            range: finite(entry.range),
            angle: finite(entry.angle),
            penumbra: finite(entry.penumbra),
            decay: finite(entry.decay),
        }
    }
}

/// A live light, in model space
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: HexColor,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
    /// Set once the target was chosen explicitly; otherwise the light
    /// follows the model center
    pub target_locked: bool,
    /// Editor range; mirrors `distance` for spot lights
    pub range: Option<f32>,
    /// Spot cutoff distance, 0 for unlimited
    pub distance: f32,
    pub angle: f32,
    pub penumbra: f32,
    pub decay: f32,
}

impl Light {
    fn build(options: &LightOptions, center: Vec3) -> Self {
        let range = finite(options.distance)
            .or(finite(options.range))
            .unwrap_or(DEFAULT_RANGE);
        let mut light = Light {
            kind: options.kind,
            color: options.color.unwrap_or(HexColor::WHITE),
            intensity: finite(options.intensity).unwrap_or(1.0),
            position: options.position.unwrap_or(center + DEFAULT_LIGHT_OFFSET),
            target: options.target_position.unwrap_or(center),
            target_locked: options.target_position.is_some(),
            range: Some(range),
            distance: 0.0,
            angle: DEFAULT_SPOT_ANGLE,
            penumbra: 0.0,
            decay: DEFAULT_SPOT_DECAY,
        };
        if light.kind == LightKind::Spot {
            light.distance = range;
            light.angle = finite(options.angle).unwrap_or(DEFAULT_SPOT_ANGLE);
            light.penumbra = finite(options.penumbra).unwrap_or(0.0);
            light.decay = finite(options.decay).unwrap_or(DEFAULT_SPOT_DECAY);
        }
        light
    }

    pub fn is_spot(&self) -> bool {
        self.kind == LightKind::Spot
    }

    pub fn to_entry(&self) -> LightEntry {
        let spot = self.is_spot();
        LightEntry {
            kind: self.kind,
            color: self.color,
            intensity: self.intensity,
            position: Some(self.position),
            target_position: self.target_locked.then_some(self.target),
            distance: spot.then_some(self.distance),
            range: finite(self.range),
            angle: spot.then_some(self.angle),
            penumbra: spot.then_some(self.penumbra),
            decay: spot.then_some(self.decay),
        }
    }

    /// Yaw, pitch (degrees) and distance of the light as seen from its target
    pub fn orientation(&self) -> (f32, f32, f32) {
        let offset = self.position - self.target;
        let (yaw, pitch) = direction_to_angles(offset);
        (yaw, pitch, offset.length())
    }
}

/// Text values of the light editor
#[derive(Debug, Clone, PartialEq)]
pub struct LightEditorInputs {
    pub kind: LightKind,
    pub color: HexColor,
    pub intensity: String,
    pub yaw: String,
    pub pitch: String,
    pub distance: String,
    pub target: [String; 3],
    pub range: String,
    pub decay: String,
    /// Degrees
    pub angle: String,
    pub penumbra: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightEvent {
    /// Any light or ambient value changed
    StateChanged,
    /// A light was added, removed or changed type
    StructureChanged,
    /// Lights were overwritten by keyframe interpolation
    Interpolated,
}

#[derive(Debug, Clone)]
pub struct LightRig {
    pub ambient: AmbientState,
    lights: Vec<Light>,
    active: usize,
    structure_editable: bool,
    default_initialized: bool,
    model_center: Vec3,
    events: Vec<LightEvent>,
}

impl Default for LightRig {
    fn default() -> Self {
        Self::new()
    }
}

impl LightRig {
    pub fn new() -> Self {
        Self {
            ambient: AmbientState::default(),
            lights: Vec::new(),
            active: 0,
            structure_editable: true,
            default_initialized: false,
            model_center: Vec3::ZERO,
            events: Vec::new(),
        }
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_light(&self) -> Option<&Light> {
        self.lights.get(self.active)
    }

    pub fn set_active(&mut self, index: usize) {
        if index < self.lights.len() {
            self.active = index;
        }
    }

    /// Model-space center used for default positions and targets
    pub fn model_center(&self) -> Vec3 {
        self.model_center
    }

    /// Move the model center and re-aim every light that follows it
    pub fn set_model_center(&mut self, center: Vec3) {
        self.model_center = center;
        let mut moved = 0;
        for light in self.lights.iter_mut().filter(|l| !l.target_locked) {
            if light.target != center {
                light.target = center;
                moved += 1;
            }
        }
        if moved > 0 {
            debug!(moved, "Re-aimed lights at model center");
            self.emit(LightEvent::StateChanged);
        }
    }

    pub fn structure_editable(&self) -> bool {
        self.structure_editable
    }

    /// Keyframe editors lock the light list outside the first keyframe
    pub fn set_structure_editable(&mut self, editable: bool) {
        self.structure_editable = editable;
    }

    pub fn remove_enabled(&self) -> bool {
        self.structure_editable && self.lights.len() > 1
    }

    pub fn drain_events(&mut self) -> Vec<LightEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: LightEvent) {
        if !self.events.contains(&event) {
            self.events.push(event);
        }
    }

    /// Add a light and make it active
    pub fn add_light(&mut self, options: LightOptions) -> usize {
        let light = Light::build(&options, self.model_center);
        self.lights.push(light);
        self.active = self.lights.len() - 1;
        self.emit(LightEvent::StateChanged);
        self.active
    }

    /// Editor "add" action; ignored while the structure is locked
    pub fn add_light_from_editor(&mut self) {
        if !self.structure_editable {
            return;
        }
        self.add_light(LightOptions::default());
        self.emit(LightEvent::StructureChanged);
    }

    /// Remove one light, clamping the active index. The last light stays.
    pub fn remove_light(&mut self, index: usize) {
        if index >= self.lights.len() || self.lights.len() <= 1 {
            return;
        }
        self.lights.remove(index);
        if self.active >= self.lights.len() {
            self.active = self.lights.len() - 1;
        }
        self.emit(LightEvent::StateChanged);
    }

    /// Remove the active light, keeping at least one
    pub fn remove_active_light(&mut self) {
        if !self.remove_enabled() {
            return;
        }
        self.remove_light(self.active);
        self.emit(LightEvent::StructureChanged);
    }

    /// Add the first default light, once per session
    pub fn ensure_default_light(&mut self) {
        if self.default_initialized {
            return;
        }
        self.default_initialized = true;
        self.add_light(LightOptions {
            intensity: Some(DEFAULT_LIGHT_INTENSITY),
            ..Default::default()
        });
    }

    /// Aim the active light at a scene-space point (preview picking)
    pub fn set_active_target(&mut self, scene_point: Vec3) {
        let Some(light) = self.lights.get_mut(self.active) else {
            return;
        };
        light.target = scene_to_model(scene_point);
        light.target_locked = true;
        self.emit(LightEvent::StateChanged);
    }

    pub fn set_ambient(&mut self, color: HexColor, intensity: f32) {
        self.ambient.color = color;
        if intensity.is_finite() {
            self.ambient.intensity = intensity.max(0.0);
        }
        self.emit(LightEvent::StateChanged);
    }

    /// Editor values for the active light
    pub fn editor_inputs(&self) -> Option<LightEditorInputs> {
        let light = self.active_light()?;
        let (yaw, pitch, distance) = light.orientation();
        let range = if light.is_spot() {
            light.range.unwrap_or(light.distance)
        } else {
            light.range.unwrap_or(0.0)
        };
        Some(LightEditorInputs {
            kind: light.kind,
            color: light.color,
            intensity: format!("{:.3}", light.intensity),
            yaw: format!("{:.2}", yaw),
            pitch: format!("{:.2}", pitch),
            distance: format!("{:.3}", distance),
            target: format_target(light.target),
            range: format!("{:.3}", range),
            decay: format!("{:.2}", light.decay),
            angle: format!("{:.1}", light.angle.to_degrees()),
            penumbra: format!("{:.2}", light.penumbra),
        })
    }

    /// Apply the editor values to the active light
    pub fn update_active(&mut self, inputs: &LightEditorInputs) {
        let Some(light) = self.lights.get_mut(self.active) else {
            return;
        };
        let current_target = light.target;
        let (current_yaw, current_pitch, current_distance) = light.orientation();

        let intensity = evaluate_numeric_input(&inputs.intensity, light.intensity);
        if intensity.is_finite() {
            light.intensity = intensity.max(0.0);
        }
        light.color = inputs.color;

        let component = |text: &str, current: f32| {
            let value = evaluate_numeric_input(text, current);
            if value.is_finite() {
                value
            } else {
                current
            }
        };
        // Untouched fields keep the exact target, and a following light
        // keeps following
        let target = if inputs.target == format_target(current_target) {
            current_target
        } else {
            light.target_locked = true;
            Vec3::new(
                component(&inputs.target[0], current_target.x),
                component(&inputs.target[1], current_target.y),
                component(&inputs.target[2], current_target.z),
            )
        };
        light.target = target;

        let yaw = evaluate_numeric_input(&inputs.yaw, current_yaw);
        let pitch = evaluate_numeric_input(&inputs.pitch, current_pitch);
        let distance = evaluate_numeric_input(&inputs.distance, current_distance);
        if yaw.is_finite() && pitch.is_finite() && distance.is_finite() {
            light.position = target + angles_to_direction(yaw, pitch) * distance.max(0.0);
        }

        if light.is_spot() {
            let range = evaluate_numeric_input(&inputs.range, light.range.unwrap_or(light.distance));
            let angle = evaluate_numeric_input(&inputs.angle, light.angle.to_degrees());
            let penumbra = evaluate_numeric_input(&inputs.penumbra, light.penumbra);
            let decay = evaluate_numeric_input(&inputs.decay, light.decay);
            if range.is_finite() {
                light.range = Some(range.max(0.0));
                light.distance = range.max(0.0);
            }
            if angle.is_finite() {
                light.angle = angle.clamp(1.0, 90.0).to_radians();
            }
            if penumbra.is_finite() {
                light.penumbra = penumbra.clamp(0.0, 1.0);
            }
            if decay.is_finite() {
                light.decay = decay.max(0.0);
            }
        } else {
            let range = evaluate_numeric_input(&inputs.range, light.range.unwrap_or(0.0));
            if range.is_finite() {
                light.range = Some(range.max(0.0));
            }
        }
        self.emit(LightEvent::StateChanged);
    }

    /// Swap the active light between directional and spot in place.
    ///
    /// Shared fields carry over. Spot fields come from the light itself
    /// when it already is a spot, otherwise from the editor values.
    pub fn set_active_kind(&mut self, kind: LightKind, inputs: &LightEditorInputs) {
        let Some(current) = self.lights.get(self.active) else {
            return;
        };
        if current.kind == kind {
            return;
        }
        let range_value = finite(Some(evaluate_numeric_input(&inputs.range, f32::NAN)))
            .or(finite(current.range))
            .unwrap_or(DEFAULT_RANGE);
        let from_input = |text: &str| finite(Some(evaluate_numeric_input(text, f32::NAN)));
        let options = if current.is_spot() {
            LightOptions {
                kind,
                color: Some(current.color),
                intensity: Some(current.intensity),
                position: Some(current.position),
                target_position: current.target_locked.then_some(current.target),
                distance: Some(current.distance),
                range: Some(range_value),
                angle: Some(current.angle),
                penumbra: Some(current.penumbra),
                decay: Some(current.decay),
            }
        } else {
            LightOptions {
                kind,
                color: Some(current.color),
                intensity: Some(current.intensity),
                position: Some(current.position),
                target_position: current.target_locked.then_some(current.target),
                distance: Some(range_value),
                range: Some(range_value),
                angle: from_input(&inputs.angle).map(f32::to_radians),
                penumbra: from_input(&inputs.penumbra),
                decay: from_input(&inputs.decay),
            }
        };
        let replacement = Light::build(&options, self.model_center);
        debug!(index = self.active, kind = ?kind, "Changed light type");
        self.lights[self.active] = replacement;
        self.emit(LightEvent::StateChanged);
        self.emit(LightEvent::StructureChanged);
    }

    pub fn state(&self) -> LightState {
        LightState {
            ambient: Some(self.ambient),
            directional: self.lights.iter().map(Light::to_entry).collect(),
        }
    }

    /// Replace all lights. An empty list yields one default light.
    pub fn apply_state(&mut self, state: &LightState) {
        if let Some(ambient) = state.ambient {
            self.ambient.color = ambient.color;
            if ambient.intensity.is_finite() {
                self.ambient.intensity = ambient.intensity.max(0.0);
            }
        }
        self.lights.clear();
        self.active = 0;
        if state.directional.is_empty() {
            self.add_light(LightOptions {
                intensity: Some(DEFAULT_LIGHT_INTENSITY),
                ..Default::default()
            });
        } else {
            for entry in &state.directional {
                self.add_light(LightOptions::from(entry));
            }
        }
        self.emit(LightEvent::StateChanged);
    }

    /// White ambient plus a single default light
    pub fn reset(&mut self) {
        self.ambient = AmbientState::default();
        self.lights.clear();
        self.active = 0;
        self.add_light(LightOptions {
            intensity: Some(DEFAULT_LIGHT_INTENSITY),
            ..Default::default()
        });
    }

    /// Blend two states at `t` in [0, 1].
    ///
    /// Colors blend in HSL. A light present on one side only fades its
    /// intensity: in with `t`, out with `1 - t`. Such lights are absent at
    /// the end where they do not exist.
    pub fn interpolated(&self, start: &LightState, end: &LightState, t: f32) -> LightState {
        let center = self.model_center;
        let start_n = normalize_light_state(Some(start));
        let end_n = normalize_light_state(Some(end));
        let start_ambient = start_n.ambient.unwrap_or_default();
        let end_ambient = end_n.ambient.unwrap_or_default();

        let ambient = match (start.ambient.is_some(), end.ambient.is_some()) {
            (false, true) => AmbientState {
                color: end_ambient.color,
                intensity: (end_ambient.intensity * t).max(0.0),
            },
            (true, false) => AmbientState {
                color: start_ambient.color,
                intensity: (start_ambient.intensity * (1.0 - t)).max(0.0),
            },
            _ => AmbientState {
                color: lerp_hsl(start_ambient.color, end_ambient.color, t),
                intensity: lerp(start_ambient.intensity, end_ambient.intensity, t).max(0.0),
            },
        };

        let default_position = center + DEFAULT_LIGHT_OFFSET;
        let count = start_n.directional.len().max(end_n.directional.len());
        let mut directional = Vec::with_capacity(count);
        for i in 0..count {
            let s = start_n.directional.get(i);
            let e = end_n.directional.get(i);
            let (from, to) = match (s, e) {
                (Some(s), Some(e)) => (s, e),
                (Some(s), None) => (s, s),
                (None, Some(e)) => (e, e),
                (None, None) => continue,
            };
            if s.is_none() && t <= 0.0 {
                continue;
            }
            if e.is_none() && t >= 1.0 {
                continue;
            }

            let scale = match (s, e) {
                (None, Some(_)) => t,
                (Some(_), None) => 1.0 - t,
                _ => 1.0,
            };
            let kind = to.kind;
            let position = from
                .position
                .unwrap_or(default_position)
                .lerp(to.position.unwrap_or(default_position), t);
            let target = from
                .target_position
                .unwrap_or(center)
                .lerp(to.target_position.unwrap_or(center), t);

            let start_distance = from.distance.unwrap_or(0.0);
            let end_distance = to.distance.unwrap_or(0.0);
            let distance = lerp(start_distance, end_distance, t);
            let current_angle = self.lights.get(i).map_or(DEFAULT_SPOT_ANGLE, |l| l.angle);
            let angle = lerp(
                from.angle.unwrap_or(current_angle),
                to.angle.unwrap_or(current_angle),
                t,
            );
            let penumbra = lerp(from.penumbra.unwrap_or(0.0), to.penumbra.unwrap_or(0.0), t);
            let decay = lerp(
                from.decay.unwrap_or(INTERPOLATION_DECAY),
                to.decay.unwrap_or(INTERPOLATION_DECAY),
                t,
            );
            let range = (from.range.is_some() || to.range.is_some()).then(|| {
                lerp(
                    from.range.unwrap_or(start_distance),
                    to.range.unwrap_or(end_distance),
                    t,
                )
            });

            let locked = from.target_position.is_some() || to.target_position.is_some();
            let spot = kind == LightKind::Spot;
            directional.push(LightEntry {
                kind,
                color: lerp_hsl(from.color, to.color, t),
                intensity: (lerp(from.intensity, to.intensity, t) * scale).max(0.0),
                position: Some(position),
                target_position: locked.then_some(target),
                distance: spot.then_some(distance),
                range,
                angle: spot.then_some(angle),
                penumbra: spot.then_some(penumbra),
                decay: spot.then_some(decay),
            });
        }

        LightState {
            ambient: Some(ambient),
            directional,
        }
    }

    /// Show an interpolated state without treating it as an edit
    pub fn apply_interpolated(&mut self, start: &LightState, end: &LightState, t: f32) {
        let state = self.interpolated(start, end, t);
        self.ambient = state.ambient.unwrap_or_default();
        let center = self.model_center;
        self.lights = state
            .directional
            .iter()
            .map(|entry| Light::build(&LightOptions::from(entry), center))
            .collect();
        if self.active >= self.lights.len() {
            self.active = self.lights.len().saturating_sub(1);
        }
        self.emit(LightEvent::Interpolated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(color: &str, intensity: f32, position: Vec3) -> LightEntry {
        LightEntry {
            color: HexColor::parse(color).unwrap(),
            intensity,
            position: Some(position),
            target_position: Some(Vec3::ZERO),
            range: Some(30.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_light_defaults() {
        let mut rig = LightRig::new();
        rig.set_model_center(Vec3::new(1.0, 2.0, 3.0));
        rig.add_light(LightOptions::default());
        let light = &rig.lights()[0];
        assert_eq!(light.kind, LightKind::Directional);
        assert_eq!(light.color, HexColor::WHITE);
        assert_eq!(light.intensity, 1.0);
        assert_eq!(light.position, Vec3::new(11.0, 12.0, 13.0));
        assert_eq!(light.target, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.range, Some(30.0));
        assert_eq!(rig.drain_events(), vec![LightEvent::StateChanged]);
    }

    #[test]
    fn test_add_spot_defaults() {
        let mut rig = LightRig::new();
        rig.add_light(LightOptions {
            kind: LightKind::Spot,
            range: Some(12.0),
            ..Default::default()
        });
        let light = &rig.lights()[0];
        assert_eq!(light.distance, 12.0);
        assert_eq!(light.range, Some(12.0));
        assert_eq!(light.angle, DEFAULT_SPOT_ANGLE);
        assert_eq!(light.penumbra, 0.0);
        assert_eq!(light.decay, 2.0);

        // distance wins over range
        let index = rig.add_light(LightOptions {
            kind: LightKind::Spot,
            distance: Some(5.0),
            range: Some(12.0),
            ..Default::default()
        });
        assert_eq!(index, 1);
        assert_eq!(rig.active_index(), 1);
        assert_eq!(rig.lights()[1].distance, 5.0);
    }

    #[test]
    fn test_remove_keeps_one_light() {
        let mut rig = LightRig::new();
        rig.ensure_default_light();
        rig.remove_active_light();
        assert_eq!(rig.lights().len(), 1);

        rig.add_light(LightOptions::default());
        rig.add_light(LightOptions::default());
        rig.set_structure_editable(false);
        rig.remove_active_light();
        assert_eq!(rig.lights().len(), 3);

        rig.set_structure_editable(true);
        rig.remove_active_light();
        assert_eq!(rig.lights().len(), 2);
        assert_eq!(rig.active_index(), 1);

        rig.remove_light(0);
        assert_eq!(rig.active_index(), 0);
    }

    #[test]
    fn test_ensure_default_light_once() {
        let mut rig = LightRig::new();
        rig.ensure_default_light();
        rig.ensure_default_light();
        assert_eq!(rig.lights().len(), 1);
        assert_eq!(rig.lights()[0].intensity, DEFAULT_LIGHT_INTENSITY);
    }

    #[test]
    fn test_remove_light_never_empties() {
        let mut rig = LightRig::new();
        rig.ensure_default_light();
        rig.drain_events();
        rig.remove_light(0);
        assert_eq!(rig.lights().len(), 1);
        assert!(rig.drain_events().is_empty());

        rig.add_light(LightOptions::default());
        rig.drain_events();
        rig.remove_light(1);
        assert_eq!(rig.lights().len(), 1);
        assert_eq!(rig.active_index(), 0);
        assert_eq!(rig.drain_events(), vec![LightEvent::StateChanged]);
    }

    #[test]
    fn test_model_center_reaims_following_lights() {
        let mut rig = LightRig::new();
        rig.set_model_center(Vec3::ZERO);
        rig.ensure_default_light();
        rig.add_light(LightOptions {
            target_position: Some(Vec3::new(0.0, 0.0, 5.0)),
            ..Default::default()
        });
        rig.drain_events();

        let center = Vec3::new(100.0, 0.0, 0.0);
        rig.set_model_center(center);
        assert_eq!(rig.lights()[0].target, center);
        assert_eq!(rig.lights()[1].target, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(rig.drain_events(), vec![LightEvent::StateChanged]);

        // Same center again is quiet
        rig.set_model_center(center);
        assert!(rig.drain_events().is_empty());
    }

    #[test]
    fn test_explicit_target_stops_following() {
        let mut rig = LightRig::new();
        rig.ensure_default_light();
        rig.set_active_target(Vec3::new(1.0, 2.0, 3.0));
        rig.set_model_center(Vec3::splat(50.0));
        assert_eq!(rig.active_light().unwrap().target, Vec3::new(1.0, -3.0, 2.0));

        // Editing only the intensity keeps a light following
        let mut rig = LightRig::new();
        rig.set_model_center(Vec3::new(0.1234, 0.0, 0.0));
        rig.ensure_default_light();
        let mut inputs = rig.editor_inputs().unwrap();
        inputs.intensity = "2".into();
        rig.update_active(&inputs);
        assert!(!rig.active_light().unwrap().target_locked);
        rig.set_model_center(Vec3::new(0.0, 7.0, 0.0));
        assert_eq!(rig.active_light().unwrap().target, Vec3::new(0.0, 7.0, 0.0));

        // Typing a target pins it
        let mut inputs = rig.editor_inputs().unwrap();
        inputs.target[2] = "4".into();
        rig.update_active(&inputs);
        rig.set_model_center(Vec3::ZERO);
        assert_eq!(rig.active_light().unwrap().target, Vec3::new(0.0, 7.0, 4.0));
        assert!(rig.state().directional[0].target_position.is_some());
    }

    #[test]
    fn test_set_active_target_converts_space() {
        let mut rig = LightRig::new();
        rig.ensure_default_light();
        rig.set_active_target(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(rig.active_light().unwrap().target, Vec3::new(1.0, -3.0, 2.0));
    }

    #[test]
    fn test_editor_round_trip() {
        let mut rig = LightRig::new();
        rig.add_light(LightOptions {
            kind: LightKind::Spot,
            position: Some(Vec3::new(0.0, -10.0, 0.0)),
            target_position: Some(Vec3::ZERO),
            ..Default::default()
        });
        let inputs = rig.editor_inputs().unwrap();
        assert_eq!(inputs.yaw, "0.00");
        assert_eq!(inputs.pitch, "0.00");
        assert_eq!(inputs.distance, "10.000");
        assert_eq!(inputs.angle, "60.0");
        assert_eq!(inputs.range, "30.000");
        assert_eq!(inputs.intensity, "1.000");

        let mut edited = inputs.clone();
        edited.intensity = "-2".into();
        edited.angle = "120".into();
        edited.penumbra = "1.5".into();
        edited.decay = "-1".into();
        edited.target = ["1".into(), "bogus".into(), "".into()];
        edited.pitch = "90".into();
        edited.distance = "v * 2".into();
        rig.update_active(&edited);

        let light = rig.active_light().unwrap();
        assert_eq!(light.intensity, 0.0);
        assert!((light.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(light.penumbra, 1.0);
        assert_eq!(light.decay, 0.0);
        assert_eq!(light.target, Vec3::new(1.0, 0.0, 0.0));
        let offset = light.position - light.target;
        assert!((offset.length() - 20.0).abs() < 1e-3);
        assert!(offset.z > 19.99);
    }

    #[test]
    fn test_set_active_kind_keeps_shared_fields() {
        let mut rig = LightRig::new();
        rig.add_light(LightOptions::default());
        rig.add_light(LightOptions {
            color: Some(HexColor::new(10, 20, 30)),
            intensity: Some(2.5),
            position: Some(Vec3::new(1.0, 2.0, 3.0)),
            ..Default::default()
        });
        let mut inputs = rig.editor_inputs().unwrap();
        inputs.range = "8".into();
        inputs.angle = "30".into();
        rig.set_active_kind(LightKind::Spot, &inputs);

        assert_eq!(rig.active_index(), 1);
        let light = rig.active_light().unwrap();
        assert!(light.is_spot());
        assert_eq!(light.color, HexColor::new(10, 20, 30));
        assert_eq!(light.intensity, 2.5);
        assert_eq!(light.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.distance, 8.0);
        assert!((light.angle - 30f32.to_radians()).abs() < 1e-6);
        assert!(rig.drain_events().contains(&LightEvent::StructureChanged));
    }

    #[test]
    fn test_state_json_shape() {
        let mut rig = LightRig::new();
        rig.add_light(LightOptions::default());
        rig.add_light(LightOptions {
            kind: LightKind::Spot,
            ..Default::default()
        });
        let json = serde_json::to_value(rig.state()).unwrap();
        let dir = &json["directional"][0];
        assert_eq!(dir["type"], "directional");
        assert_eq!(dir["color"], "#ffffff");
        assert!(dir.get("angle").is_none());
        // Follows the model center, so no explicit target is stored
        assert!(dir.get("targetPosition").is_none());
        let spot = &json["directional"][1];
        assert_eq!(spot["type"], "spot");
        assert!(spot.get("angle").is_some());
        assert_eq!(json["ambient"]["intensity"], 1.0);
    }

    #[test]
    fn test_apply_state_round_trip() {
        let mut rig = LightRig::new();
        rig.add_light(LightOptions {
            kind: LightKind::Spot,
            color: Some(HexColor::new(200, 100, 0)),
            distance: Some(7.0),
            penumbra: Some(0.3),
            ..Default::default()
        });
        rig.set_ambient(HexColor::new(20, 20, 20), 0.4);
        let saved = rig.state();

        let mut other = LightRig::new();
        other.apply_state(&saved);
        assert_eq!(other.state(), saved);

        other.apply_state(&LightState::default());
        assert_eq!(other.lights().len(), 1);
        assert_eq!(other.lights()[0].intensity, DEFAULT_LIGHT_INTENSITY);
    }

    #[test]
    fn test_reset() {
        let mut rig = LightRig::new();
        rig.set_ambient(HexColor::BLACK, 3.0);
        rig.add_light(LightOptions::default());
        rig.add_light(LightOptions::default());
        rig.reset();
        assert_eq!(rig.ambient, AmbientState::default());
        assert_eq!(rig.lights().len(), 1);
    }

    #[test]
    fn test_normalize_and_equality() {
        let normalized = normalize_light_state(None);
        assert_eq!(normalized.ambient, Some(AmbientState::default()));
        assert!(normalized.directional.is_empty());

        let a = entry("#ff0000", 1.0, Vec3::ONE);
        let mut b = a.clone();
        b.intensity += 5e-5;
        assert!(entries_equal(Some(&a), Some(&b)));
        b.position = Some(Vec3::new(1.0, 1.0, 1.01));
        assert!(!entries_equal(Some(&a), Some(&b)));
        b.position = None;
        assert!(!entries_equal(Some(&a), Some(&b)));
        assert!(entries_equal(None, None));
        assert!(!entries_equal(Some(&a), None));
    }

    #[test]
    fn test_interpolation_endpoints() {
        let rig = LightRig::new();
        let start = LightState {
            ambient: Some(AmbientState {
                color: HexColor::new(255, 0, 0),
                intensity: 0.5,
            }),
            directional: vec![entry("#00ff00", 1.0, Vec3::new(1.0, 2.0, 3.0))],
        };
        let end = LightState {
            ambient: Some(AmbientState {
                color: HexColor::new(0, 0, 255),
                intensity: 1.5,
            }),
            directional: vec![entry("#0000ff", 3.0, Vec3::new(-4.0, 0.0, 8.0))],
        };

        let at_start = rig.interpolated(&start, &end, 0.0);
        assert_eq!(at_start.ambient, start.ambient);
        assert!(entries_equal(at_start.directional.first(), start.directional.first()));

        let at_end = rig.interpolated(&start, &end, 1.0);
        assert_eq!(at_end.ambient.unwrap().color, end.ambient.unwrap().color);
        assert!((at_end.ambient.unwrap().intensity - 1.5).abs() < 1e-6);
        assert!(entries_equal(at_end.directional.first(), end.directional.first()));

        let mid = rig.interpolated(&start, &end, 0.5);
        let light = &mid.directional[0];
        assert!((light.intensity - 2.0).abs() < 1e-6);
        assert!((light.position.unwrap() - Vec3::new(-1.5, 1.0, 5.5)).length() < 1e-5);
    }

    #[test]
    fn test_interpolation_count_mismatch_fades() {
        let rig = LightRig::new();
        let one = LightState {
            ambient: Some(AmbientState::default()),
            directional: vec![entry("#ffffff", 2.0, Vec3::ONE)],
        };
        let two = LightState {
            ambient: None,
            directional: vec![
                entry("#ffffff", 2.0, Vec3::ONE),
                entry("#ff0000", 4.0, Vec3::splat(5.0)),
            ],
        };

        assert_eq!(rig.interpolated(&one, &two, 0.0).directional.len(), 1);
        let quarter = rig.interpolated(&one, &two, 0.25);
        assert_eq!(quarter.directional.len(), 2);
        assert!((quarter.directional[1].intensity - 1.0).abs() < 1e-6);
        // Ambient only at the start fades out
        assert!((quarter.ambient.unwrap().intensity - 0.75).abs() < 1e-6);

        let back = rig.interpolated(&two, &one, 0.75);
        assert!((back.directional[1].intensity - 1.0).abs() < 1e-6);
        assert_eq!(rig.interpolated(&two, &one, 1.0).directional.len(), 1);
    }

    #[test]
    fn test_apply_interpolated() {
        let mut rig = LightRig::new();
        rig.ensure_default_light();
        rig.drain_events();
        let start = rig.state();
        let mut end = start.clone();
        end.directional[0].intensity = 0.5;
        rig.apply_interpolated(&start, &end, 0.5);
        assert!((rig.lights()[0].intensity - 1.0).abs() < 1e-6);
        assert_eq!(rig.drain_events(), vec![LightEvent::Interpolated]);
    }
}
