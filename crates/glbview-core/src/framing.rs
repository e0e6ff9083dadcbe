//! Framing a bounding box with the perspective and orthographic cameras

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bounds::Aabb;

/// Distance multiplier used when framing the whole model
pub const FRAME_OFFSET: f32 = 1.25;

/// Margin around orthographic extents and face presets
pub const FRAME_PADDING: f32 = 1.15;

/// Fixed diagonal the default view looks along (toward the model)
pub fn frame_direction() -> Vec3 {
    Vec3::new(0.5, 0.5, 1.0).normalize()
}

/// Camera position and look-at target, in scene space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramedPose {
    pub position: Vec3,
    pub target: Vec3,
}

/// Position the perspective camera so the whole box fits the vertical FOV
pub fn frame_perspective(bounds: &Aabb, fov_deg: f32) -> FramedPose {
    let center = bounds.center();
    let half_fov = fov_deg.to_radians() * 0.5;
    let distance = bounds.max_extent() / (2.0 * half_fov.tan()) * FRAME_OFFSET;
    FramedPose {
        position: center + frame_direction() * distance,
        target: center,
    }
}

/// Orthographic view volume in camera space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoFrustum {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrthoFrustum {
    fn default() -> Self {
        Self {
            left: -1.0,
            right: 1.0,
            top: 1.0,
            bottom: -1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl OrthoFrustum {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Shrink the visible area by a zoom factor (>1 zooms in)
    pub fn zoomed(&self, zoom: f32) -> Self {
        let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
        Self {
            left: self.left / zoom,
            right: self.right / zoom,
            top: self.top / zoom,
            bottom: self.bottom / zoom,
            ..*self
        }
    }
}

/// View matrix looking from `position` at `target` with the given up.
///
/// Falls back to +Y, then +Z, when `up` is degenerate or runs parallel
/// to the view.
pub fn view_matrix(position: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let dir = (target - position).normalize_or_zero();
    let usable = |candidate: Vec3| dir.cross(candidate.normalize_or_zero()).length_squared() >= 1e-12;
    let up = [up, Vec3::Y, Vec3::Z]
        .into_iter()
        .find(|candidate| usable(*candidate))
        .unwrap_or(Vec3::X);
    Mat4::look_at_rh(position, target, up)
}

/// Fit an orthographic frustum around the box as seen from `position`
/// with the camera's `up` (rolled or not).
///
/// Extents are symmetric about the view axis, padded, then widened along
/// one axis to match `aspect`. Near and far keep one view-width of slack
/// beyond the box depth.
pub fn fit_orthographic(bounds: &Aabb, position: Vec3, target: Vec3, up: Vec3, aspect: f32) -> OrthoFrustum {
    let view = view_matrix(position, target, up);

    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for corner in bounds.corners() {
        let p = view.transform_point3(corner);
        min = min.min(p);
        max = max.max(p);
    }

    let half_x = min.x.abs().max(max.x.abs()) * FRAME_PADDING;
    let half_y = min.y.abs().max(max.y.abs()) * FRAME_PADDING;
    let mut width = half_x * 2.0;
    let mut height = half_y * 2.0;
    if !(width > 0.0) || !width.is_finite() {
        width = 1.0;
    }
    if !(height > 0.0) || !height.is_finite() {
        height = 1.0;
    }

    let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
    let (mut view_width, mut view_height) = (width, height);
    if view_width / view_height < aspect {
        view_width = view_height * aspect;
    } else {
        view_height = view_width / aspect;
    }

    let near = (-max.z - width).max(0.01);
    let far = (-min.z + width).max(near + 1.0);

    OrthoFrustum {
        left: -view_width / 2.0,
        right: view_width / 2.0,
        top: view_height / 2.0,
        bottom: -view_height / 2.0,
        near,
        far,
    }
}

/// Axis-aligned view presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::Front, Face::Back, Face::Left, Face::Right, Face::Top, Face::Bottom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Face::Front => "front",
            Face::Back => "back",
            Face::Left => "left",
            Face::Right => "right",
            Face::Top => "top",
            Face::Bottom => "bottom",
        }
    }

    /// Scene-space direction from the box center toward the camera
    pub fn normal(&self) -> Vec3 {
        match self {
            Face::Front => Vec3::Z,
            Face::Back => Vec3::NEG_Z,
            Face::Left => Vec3::NEG_X,
            Face::Right => Vec3::X,
            Face::Top => Vec3::Y,
            Face::Bottom => Vec3::NEG_Y,
        }
    }

    /// (width, height) of the box as seen from this face
    fn extent(&self, size: Vec3) -> (f32, f32) {
        match self {
            Face::Front | Face::Back => (size.x, size.y),
            Face::Left | Face::Right => (size.z, size.y),
            Face::Top | Face::Bottom => (size.x, size.z),
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Face {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Face::ALL
            .into_iter()
            .find(|face| face.as_str() == s)
            .ok_or_else(|| format!("unknown face preset: {}", s))
    }
}

/// Pose looking at the box center straight down a face normal.
///
/// The distance fits both the vertical FOV and the horizontal extent at
/// the given aspect. Returns `None` for a non-finite box.
pub fn face_preset(bounds: &Aabb, face: Face, fov_deg: f32, aspect: f32) -> Option<FramedPose> {
    if !bounds.is_finite() {
        return None;
    }
    let center = bounds.center();
    let (width, height) = face.extent(bounds.size());
    let width = width.max(1e-6);
    let height = height.max(1e-6);
    let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };

    let tan_half = (fov_deg.to_radians() / 2.0).tan();
    let distance_height = (height / 2.0) / tan_half;
    let distance_width = (width / 2.0) / (tan_half * aspect);
    let distance = distance_height.max(distance_width) * FRAME_PADDING;

    Some(FramedPose {
        position: center + face.normal() * distance,
        target: center,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checks against the view a renderer builds, not the fitter's own
    fn assert_contains(frustum: &OrthoFrustum, bounds: &Aabb, position: Vec3, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(position, target, up);
        for corner in bounds.corners() {
            let p = view.transform_point3(corner);
            assert!(p.x >= frustum.left - 1e-3 && p.x <= frustum.right + 1e-3, "x {} outside", p.x);
            assert!(p.y >= frustum.bottom - 1e-3 && p.y <= frustum.top + 1e-3, "y {} outside", p.y);
            let depth = -p.z;
            assert!(depth >= frustum.near - 1e-3 && depth <= frustum.far + 1e-3, "depth {} outside", depth);
        }
    }

    #[test]
    fn test_frame_perspective_distance() {
        let bounds = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let pose = frame_perspective(&bounds, 20.0);
        assert_eq!(pose.target, Vec3::ZERO);
        let expected = 2.0 / (2.0 * 10f32.to_radians().tan()) * FRAME_OFFSET;
        assert!((pose.position.length() - expected).abs() < 1e-3);
        let dir = pose.position.normalize();
        assert!((dir - frame_direction()).length() < 1e-5);
    }

    #[test]
    fn test_ortho_contains_corners() {
        let cases = [
            (
                Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0)),
                Vec3::new(10.0, 8.0, 12.0),
                Vec3::ZERO,
                16.0 / 9.0,
            ),
            (
                Aabb::new(Vec3::new(5.0, 0.0, 5.0), Vec3::new(9.0, 1.0, 6.0)),
                Vec3::new(-20.0, 3.0, -4.0),
                Vec3::new(1.0, 1.0, 1.0),
                0.5,
            ),
            (
                Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(100.0, 0.0, 40.0)),
                Vec3::new(50.0, 300.0, 20.0),
                Vec3::new(50.0, 0.0, 20.0),
                1.0,
            ),
            (
                Aabb::new(Vec3::new(-0.01, -0.01, -0.01), Vec3::new(0.02, 0.01, 0.03)),
                Vec3::new(0.5, -0.4, 0.3),
                Vec3::new(0.3, 0.0, 0.0),
                2.4,
            ),
        ];
        for (bounds, position, target, aspect) in cases {
            let dir = (target - position).normalize();
            let up = if dir.cross(Vec3::Y).length_squared() < 1e-12 { Vec3::Z } else { Vec3::Y };
            let frustum = fit_orthographic(&bounds, position, target, up, aspect);
            assert!(frustum.near >= 0.01);
            assert!(frustum.far >= frustum.near + 1.0);
            assert!((frustum.width() / frustum.height() - aspect).abs() < 1e-3);
            assert_contains(&frustum, &bounds, position, target, up);
        }
    }

    #[test]
    fn test_ortho_contains_corners_when_rolled() {
        // Long box seen head-on, camera rolled a quarter turn
        let bounds = Aabb::new(Vec3::new(-10.0, -1.0, -1.0), Vec3::new(10.0, 1.0, 1.0));
        let position = Vec3::new(0.0, 0.0, 50.0);
        for up in [Vec3::X, Vec3::new(1.0, 1.0, 0.0).normalize(), Vec3::NEG_Y] {
            let frustum = fit_orthographic(&bounds, position, Vec3::ZERO, up, 4.0);
            assert_contains(&frustum, &bounds, position, Vec3::ZERO, up);
        }

        // Rolled by 90 degrees the long side runs vertically
        let level = fit_orthographic(&bounds, position, Vec3::ZERO, Vec3::Y, 4.0);
        let rolled = fit_orthographic(&bounds, position, Vec3::ZERO, Vec3::X, 4.0);
        assert!(level.height() < 20.0);
        assert!(rolled.height() >= 20.0);
    }

    #[test]
    fn test_view_matrix_degenerate_up() {
        // Up parallel to the view direction falls back to +Y
        let position = Vec3::new(0.0, 0.0, 10.0);
        let view = view_matrix(position, Vec3::ZERO, Vec3::Z);
        let expected = Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Y);
        assert!(view.abs_diff_eq(expected, 1e-6));

        // Looking straight down Y uses +Z
        let position = Vec3::new(0.0, 10.0, 0.0);
        let view = view_matrix(position, Vec3::ZERO, Vec3::ZERO);
        let expected = Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Z);
        assert!(view.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_ortho_flat_box_gets_unit_extent() {
        // A point-sized box still yields a usable frustum
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ZERO);
        let frustum = fit_orthographic(&bounds, Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y, 1.0);
        assert!((frustum.width() - 1.0).abs() < 1e-6);
        assert!((frustum.height() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_face_preset() {
        let bounds = Aabb::new(Vec3::new(-2.0, -1.0, -0.5), Vec3::new(2.0, 1.0, 0.5));
        let pose = face_preset(&bounds, Face::Top, 40.0, 1.0).unwrap();
        assert_eq!(pose.target, Vec3::ZERO);
        let offset = pose.position - pose.target;
        assert!(offset.x.abs() < 1e-6 && offset.z.abs() < 1e-6);
        assert!(offset.y > 0.0);

        // Width 4 dominates at aspect 1
        let tan_half = 20f32.to_radians().tan();
        let expected = (2.0 / tan_half) * FRAME_PADDING;
        assert!((offset.y - expected).abs() < 1e-3);

        let bad = Aabb { min: Vec3::splat(f32::INFINITY), max: Vec3::splat(f32::NEG_INFINITY) };
        assert!(face_preset(&bad, Face::Front, 20.0, 1.0).is_none());
    }

    #[test]
    fn test_face_parse() {
        assert_eq!("left".parse::<Face>().unwrap(), Face::Left);
        assert!("diagonal".parse::<Face>().is_err());
        assert_eq!(Face::Bottom.to_string(), "bottom");
    }
}
