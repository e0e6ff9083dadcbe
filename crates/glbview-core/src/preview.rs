//! Settings dialog tabs and the preview camera

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::camera::{CameraRig, MIN_DISTANCE};
use crate::lights::LightRig;

pub const PREVIEW_FOV_DEG: f32 = 40.0;
pub const PREVIEW_NEAR: f32 = 0.1;
pub const PREVIEW_FAR: f32 = 5000.0;
pub const PREVIEW_DAMPING: f32 = 0.08;

/// Residual rotation below which damping stops
const SETTLE_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsTab {
    #[default]
    General,
    Camera,
    Lights,
    Theme,
}

impl SettingsTab {
    pub const ALL: [SettingsTab; 4] = [
        SettingsTab::General,
        SettingsTab::Camera,
        SettingsTab::Lights,
        SettingsTab::Theme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsTab::General => "general",
            SettingsTab::Camera => "camera",
            SettingsTab::Lights => "lights",
            SettingsTab::Theme => "theme",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SettingsTab::General => "General",
            SettingsTab::Camera => "Camera",
            SettingsTab::Lights => "Lights",
            SettingsTab::Theme => "Theme",
        }
    }

    /// Tabs that embed the preview viewport
    pub fn has_preview(&self) -> bool {
        matches!(self, SettingsTab::Camera | SettingsTab::Lights)
    }
}

impl fmt::Display for SettingsTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingsTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingsTab::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown settings tab: {}", s))
    }
}

/// Result of a double-click in the preview
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickAction {
    /// Aim the main camera at a scene-space point
    RetargetCamera(Vec3),
    /// Aim the active light at a scene-space point
    SetLightTarget(Vec3),
}

/// Secondary orbit camera shown inside the settings dialog
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pending: Vec2,
}

impl Default for PreviewCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            fov_deg: PREVIEW_FOV_DEG,
            near: PREVIEW_NEAR,
            far: PREVIEW_FAR,
            pending: Vec2::ZERO,
        }
    }
}

impl PreviewCamera {
    /// Queue an orbit; it is applied gradually by [`PreviewCamera::update`]
    pub fn orbit(&mut self, delta_azimuth: f32, delta_polar: f32) {
        self.pending += Vec2::new(delta_azimuth, delta_polar);
    }

    pub fn zoom(&mut self, scale: f32) {
        if !(scale.is_finite() && scale > 0.0) {
            return;
        }
        let offset = self.position - self.target;
        let distance = (offset.length() * scale).max(MIN_DISTANCE);
        self.position = self.target + offset.normalize_or(Vec3::Z) * distance;
    }

    /// Apply one damping step; returns whether the camera moved
    pub fn update(&mut self) -> bool {
        if self.pending.length() < SETTLE_EPSILON {
            self.pending = Vec2::ZERO;
            return false;
        }
        let step = self.pending * PREVIEW_DAMPING;
        self.pending *= 1.0 - PREVIEW_DAMPING;

        let offset = self.position - self.target;
        let radius = offset.length();
        if radius < MIN_DISTANCE {
            return false;
        }
        let theta = offset.x.atan2(offset.z) - step.x;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() - step.y)
            .clamp(1e-6, std::f32::consts::PI - 1e-6);
        let sin_phi = phi.sin();
        self.position =
            self.target + Vec3::new(sin_phi * theta.sin(), phi.cos(), sin_phi * theta.cos()) * radius;
        true
    }
}

/// Dialog visibility, active tab and the preview camera
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewState {
    open: bool,
    tab: SettingsTab,
    pub camera: PreviewCamera,
}

impl PreviewState {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn tab(&self) -> SettingsTab {
        self.tab
    }

    /// Open the dialog on `tab` and mirror the main camera
    pub fn open(&mut self, tab: SettingsTab, main: &CameraRig) {
        self.open = true;
        self.activate_tab(tab, main);
    }

    /// Closing only hides the preview; pending work is left alone
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn activate_tab(&mut self, tab: SettingsTab, main: &CameraRig) {
        self.tab = tab;
        self.sync_from_main(main);
    }

    /// Copy the main camera pose into the preview camera
    pub fn sync_from_main(&mut self, main: &CameraRig) {
        self.camera.position = main.position();
        self.camera.target = main.target();
        self.camera.pending = Vec2::ZERO;
    }

    /// Whether the preview viewport is rendered this frame
    pub fn preview_active(&self) -> bool {
        self.open && self.tab.has_preview()
    }

    pub fn camera_helpers_visible(&self) -> bool {
        self.open && self.tab == SettingsTab::Camera
    }

    pub fn light_helpers_visible(&self) -> bool {
        self.open && self.tab == SettingsTab::Lights
    }

    /// Translate a double-click hit into an action for the current tab
    pub fn pick(&self, hit: Vec3) -> Option<PickAction> {
        if !self.open {
            return None;
        }
        match self.tab {
            SettingsTab::Camera => Some(PickAction::RetargetCamera(hit)),
            SettingsTab::Lights => Some(PickAction::SetLightTarget(hit)),
            _ => None,
        }
    }

    /// Run a pick against the rigs. The main camera keeps its position
    /// and roll.
    pub fn apply_pick(&mut self, action: PickAction, camera: &mut CameraRig, lights: &mut LightRig) {
        match action {
            PickAction::RetargetCamera(point) => {
                let (position, roll) = (camera.position(), camera.roll_deg());
                camera.set_pose(position, point, roll);
                camera.controls_changed();
                self.sync_from_main(camera);
            }
            PickAction::SetLightTarget(point) => lights.set_active_target(point),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Aabb;
    use crate::models::SceneBounds;

    fn rig() -> CameraRig {
        let mut rig = CameraRig::new(1.0);
        rig.bounds = SceneBounds {
            reference: None,
            visible: Some(Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))),
        };
        rig.reset_home();
        rig
    }

    #[test]
    fn test_helper_visibility_follows_tab() {
        let main = rig();
        let mut preview = PreviewState::default();
        assert!(!preview.camera_helpers_visible());

        preview.open(SettingsTab::Camera, &main);
        assert!(preview.camera_helpers_visible());
        assert!(!preview.light_helpers_visible());
        assert!(preview.preview_active());

        preview.activate_tab(SettingsTab::Lights, &main);
        assert!(preview.light_helpers_visible());
        assert!(!preview.camera_helpers_visible());

        preview.activate_tab(SettingsTab::Theme, &main);
        assert!(!preview.preview_active());

        preview.close();
        assert!(!preview.light_helpers_visible());
    }

    #[test]
    fn test_sync_from_main() {
        let main = rig();
        let mut preview = PreviewState::default();
        preview.open(SettingsTab::General, &main);
        assert_eq!(preview.camera.position, main.position());
        assert_eq!(preview.camera.target, main.target());
        assert_eq!(preview.camera.fov_deg, 40.0);
    }

    #[test]
    fn test_pick_retargets_camera() {
        let mut main = rig();
        let mut lights = LightRig::new();
        let mut preview = PreviewState::default();
        assert!(preview.pick(Vec3::ONE).is_none());

        preview.open(SettingsTab::Camera, &main);
        let before = main.position();
        let action = preview.pick(Vec3::new(0.5, 0.0, 0.0)).unwrap();
        preview.apply_pick(action, &mut main, &mut lights);
        assert_eq!(main.position(), before);
        assert_eq!(main.target(), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(preview.camera.target, main.target());
    }

    #[test]
    fn test_pick_sets_light_target() {
        let mut main = rig();
        let mut lights = LightRig::new();
        lights.ensure_default_light();
        let mut preview = PreviewState::default();
        preview.open(SettingsTab::Lights, &main);
        let action = preview.pick(Vec3::new(0.0, 2.0, 0.0)).unwrap();
        assert_eq!(action, PickAction::SetLightTarget(Vec3::new(0.0, 2.0, 0.0)));
        preview.apply_pick(action, &mut main, &mut lights);
        assert_eq!(lights.active_light().unwrap().target, Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_damped_orbit_settles() {
        let mut camera = PreviewCamera::default();
        let radius = camera.position.length();
        camera.orbit(0.5, 0.0);
        let mut steps = 0;
        while camera.update() {
            steps += 1;
            assert!(steps < 1000);
        }
        assert!(steps > 10);
        assert!((camera.position.length() - radius).abs() < 1e-3);
        // Nearly the full half radian was applied
        let angle = camera.position.x.atan2(camera.position.z);
        assert!((angle + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_tab_names() {
        assert_eq!("lights".parse::<SettingsTab>(), Ok(SettingsTab::Lights));
        assert!("other".parse::<SettingsTab>().is_err());
        assert_eq!(SettingsTab::Theme.to_string(), "theme");
    }
}
