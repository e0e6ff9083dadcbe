//! Camera pose parameterization
//!
//! Poses are stored as position + target in model space (Z up) and edited
//! through yaw/pitch/distance/roll. The scene itself is Y up: the world
//! group rotates model space by -90 degrees about X.

use glam::{Quat, Vec3};

/// Pitch limit that keeps the view direction off the pole
pub const MAX_PITCH_DEG: f32 = 89.9999;

/// Directions shorter than this are treated as degenerate
pub const DIRECTION_EPSILON: f32 = 1e-6;

/// Rotation of the world group about X
pub const WORLD_ROTATION_X: f32 = -std::f32::consts::FRAC_PI_2;

/// Model space (Z up) to scene space (Y up)
pub fn model_to_scene(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, -v.y)
}

/// Scene space (Y up) to model space (Z up)
pub fn scene_to_model(v: Vec3) -> Vec3 {
    Vec3::new(v.x, -v.z, v.y)
}

/// Rotation applied to the world group entity
pub fn world_rotation() -> Quat {
    Quat::from_rotation_x(WORLD_ROTATION_X)
}

/// Wrap into [0, 360); non-finite input becomes 0
pub fn normalize_angle_deg(deg: f32) -> f32 {
    if !deg.is_finite() {
        return 0.0;
    }
    let wrapped = deg.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Clamp to +-MAX_PITCH_DEG; non-finite input becomes 0
pub fn clamp_pitch_deg(deg: f32) -> f32 {
    if !deg.is_finite() {
        return 0.0;
    }
    deg.clamp(-MAX_PITCH_DEG, MAX_PITCH_DEG)
}

/// Model-space direction to (yaw, pitch) in degrees.
///
/// Yaw is measured from +Y (atan2(y, x) + 90), pitch is the elevation
/// above the XY plane.
pub fn direction_to_angles(direction: Vec3) -> (f32, f32) {
    let length = direction.length();
    if !(length >= DIRECTION_EPSILON) {
        return (0.0, 0.0);
    }
    let dir = direction / length;
    let yaw = dir.y.atan2(dir.x).to_degrees() + 90.0;
    let pitch = dir.z.clamp(-1.0, 1.0).asin().to_degrees();
    (normalize_angle_deg(yaw), clamp_pitch_deg(pitch))
}

/// Inverse of [`direction_to_angles`], returns a unit vector
pub fn angles_to_direction(yaw_deg: f32, pitch_deg: f32) -> Vec3 {
    let yaw = normalize_angle_deg(yaw_deg - 90.0).to_radians();
    let pitch = clamp_pitch_deg(pitch_deg).to_radians();
    let cos_pitch = pitch.cos();
    Vec3::new(cos_pitch * yaw.cos(), cos_pitch * yaw.sin(), pitch.sin())
}

/// Scene up (+Y) orthogonalized against the view direction.
///
/// Falls back to +Z when looking (almost) straight along Y.
pub fn reference_up(view_dir: Vec3) -> Vec3 {
    let mut base_up = Vec3::Y;
    if view_dir.dot(base_up).abs() > 0.999 {
        base_up = Vec3::Z;
    }
    let mut projected = base_up - view_dir * base_up.dot(view_dir);
    if projected.length() < DIRECTION_EPSILON {
        projected = Vec3::Z - view_dir * Vec3::Z.dot(view_dir);
    }
    projected.normalize_or_zero()
}

/// Signed angle in degrees from the reference up to `camera_up` about the view axis
pub fn roll_from_up(view_dir: Vec3, camera_up: Vec3) -> f32 {
    let view_dir = view_dir.normalize_or_zero();
    if view_dir.length_squared() < DIRECTION_EPSILON {
        return 0.0;
    }
    let base_up = reference_up(view_dir);
    let cam_up = camera_up.normalize_or_zero();
    let sin = view_dir.dot(base_up.cross(cam_up));
    let cos = base_up.dot(cam_up);
    sin.atan2(cos).to_degrees()
}

/// Camera up vector for a pose rolled by `roll_deg` about the view axis
pub fn up_for_roll(position: Vec3, target: Vec3, roll_deg: f32) -> Vec3 {
    let view_dir = (target - position).normalize_or_zero();
    if view_dir.length_squared() < DIRECTION_EPSILON {
        return Vec3::Y;
    }
    let roll = if roll_deg.is_finite() { roll_deg } else { 0.0 };
    let base_up = reference_up(view_dir);
    Quat::from_axis_angle(view_dir, roll.to_radians()) * base_up
}

pub const MIN_FOV_DEG: f32 = 5.0;
pub const MAX_FOV_DEG: f32 = 120.0;

/// Clamp a vertical FOV to [5, 120], using `fallback` for non-finite input
pub fn clamp_fov(value: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(MIN_FOV_DEG, MAX_FOV_DEG)
}

/// Serde adapter for `{x, y, z}` objects
pub(crate) mod xyz {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xyz {
        #[serde(default)]
        x: f32,
        #[serde(default)]
        y: f32,
        #[serde(default)]
        z: f32,
    }

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        Xyz { x: v.x, y: v.y, z: v.z }.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        let p = Xyz::deserialize(d)?;
        Ok(Vec3::new(p.x, p.y, p.z))
    }

    pub mod option {
        use super::Xyz;
        use glam::Vec3;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(v: &Option<Vec3>, s: S) -> Result<S::Ok, S::Error> {
            v.map(|v| Xyz { x: v.x, y: v.y, z: v.z }).serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec3>, D::Error> {
            let p = Option::<Xyz>::deserialize(d)?;
            Ok(p.map(|p| Vec3::new(p.x, p.y, p.z)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angles_round_trip() {
        for &(yaw, pitch) in &[(45.0, 30.0), (120.0, -60.0), (270.5, 0.0), (359.0, 89.0), (10.0, -89.0)] {
            let dir = angles_to_direction(yaw, pitch);
            assert!((dir.length() - 1.0).abs() < 1e-5);
            let (y, p) = direction_to_angles(dir * 7.5);
            assert!((y - yaw).abs() < 1e-2, "yaw {} -> {}", yaw, y);
            assert!((p - pitch).abs() < 1e-2, "pitch {} -> {}", pitch, p);
        }
    }

    #[test]
    fn test_yaw_convention() {
        // Looking from -Y toward the origin puts the camera at yaw 0
        let (yaw, pitch) = direction_to_angles(Vec3::new(0.0, -1.0, 0.0));
        assert!(yaw.abs() < 1e-4);
        assert!(pitch.abs() < 1e-4);
        let (yaw, _) = direction_to_angles(Vec3::X);
        assert!((yaw - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_direction() {
        assert_eq!(direction_to_angles(Vec3::ZERO), (0.0, 0.0));
        assert_eq!(direction_to_angles(Vec3::splat(1e-8)), (0.0, 0.0));
    }

    #[test]
    fn test_pitch_clamped() {
        let (_, pitch) = direction_to_angles(Vec3::Z);
        assert!((pitch - MAX_PITCH_DEG).abs() < 1e-4);
        assert_eq!(clamp_pitch_deg(f32::NAN), 0.0);
        assert_eq!(clamp_pitch_deg(-120.0), -MAX_PITCH_DEG);
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle_deg(-90.0), 270.0);
        assert_eq!(normalize_angle_deg(720.0), 0.0);
        assert_eq!(normalize_angle_deg(f32::INFINITY), 0.0);
        assert!(normalize_angle_deg(-1e-8) < 360.0);
    }

    #[test]
    fn test_space_conversion() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(scene_to_model(model_to_scene(v)), v);
        // Model Z is scene Y
        assert_eq!(model_to_scene(Vec3::Z), Vec3::Y);
        let rotated = world_rotation() * v;
        assert!((rotated - model_to_scene(v)).length() < 1e-5);
    }

    #[test]
    fn test_roll_round_trip() {
        let position = Vec3::new(3.0, 2.0, 5.0);
        let target = Vec3::new(0.5, 0.0, -1.0);
        let view_dir = (target - position).normalize();
        for roll in [-150.0_f32, -30.0, 0.0, 15.0, 90.0, 179.0] {
            let up = up_for_roll(position, target, roll);
            assert!(up.dot(view_dir).abs() < 1e-5);
            let back = roll_from_up(view_dir, up);
            assert!((back - roll).abs() < 1e-3, "roll {} -> {}", roll, back);
        }
    }

    #[test]
    fn test_reference_up_along_y() {
        let up = reference_up(Vec3::NEG_Y);
        assert!((up - Vec3::Z).length() < 1e-6);
        let up = reference_up(Vec3::new(1.0, 0.0, 0.0));
        assert!((up - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_clamp_fov() {
        assert_eq!(clamp_fov(1.0, 20.0), 5.0);
        assert_eq!(clamp_fov(500.0, 20.0), 120.0);
        assert_eq!(clamp_fov(f32::NAN, 20.0), 20.0);
        assert_eq!(clamp_fov(45.0, 20.0), 45.0);
    }
}
