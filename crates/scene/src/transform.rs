//! Local-space transform of a scene node.
//!
//! A [`Transform`] is always relative to its node's parent; the
//! [`SceneGraph`](crate::SceneGraph) composes the parent chain into world
//! matrices.
//!
//! # Example
//!
//! ```
//! use orrery_scene::Transform;
//! use glam::Vec3;
//!
//! let planet = Transform::new()
//!     .with_position(Vec3::new(4.0, 0.0, 0.0))
//!     .with_uniform_scale(0.5);
//! let pos = planet.local_matrix().transform_point3(Vec3::ZERO);
//! assert!((pos - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-5);
//! ```

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};

/// Position, rotation and scale relative to the parent node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vec3::splat(scale))
    }

    /// Local transformation matrix (scale, then rotate, then translate).
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Rotate about the local Y axis by `angle` radians.
    pub fn rotate_y(&mut self, angle: f32) {
        self.rotation = (self.rotation * Quat::from_rotation_y(angle)).normalize();
    }

    /// Set the rotation to a pure Y rotation, wrapped into `[0, 2π)`.
    pub fn set_yaw(&mut self, angle: f32) {
        self.rotation = Quat::from_rotation_y(angle.rem_euclid(TAU));
    }

    /// Largest scale component; bounds how far a unit sphere can reach.
    pub fn max_scale(&self) -> f32 {
        self.scale.abs().max_element()
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

/// Inverse-transpose of `model` for transforming normals.
///
/// Falls back to identity for singular matrices (e.g. zero scale) so shaders
/// never see NaN.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    const EPSILON: f32 = 1e-6;
    if model.determinant().abs() < EPSILON {
        Mat4::IDENTITY
    } else {
        model.inverse().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.local_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_builder() {
        let t = Transform::new()
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_uniform_scale(2.0);
        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::splat(2.0));
        assert_eq!(t.max_scale(), 2.0);
    }

    #[test]
    fn test_rotate_y_moves_offset_point() {
        // A pivot rotated a quarter turn carries +X onto -Z.
        let mut pivot = Transform::new();
        pivot.rotate_y(FRAC_PI_2);
        let p = pivot.local_matrix().transform_point3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::NEG_Z), "got {p:?}");
    }

    #[test]
    fn test_rotate_y_accumulates() {
        let mut a = Transform::new();
        a.rotate_y(0.25);
        a.rotate_y(0.5);
        let b = Transform::new().with_rotation(Quat::from_rotation_y(0.75));
        assert!(a.rotation.angle_between(b.rotation) < 1e-4);
    }

    #[test]
    fn test_set_yaw_wraps() {
        let mut t = Transform::new();
        t.set_yaw(TAU + 0.5);
        let expected = Quat::from_rotation_y(0.5);
        assert!(t.rotation.angle_between(expected) < 1e-4);
    }

    #[test]
    fn test_max_scale_ignores_sign() {
        let t = Transform::new().with_scale(Vec3::new(1.0, -3.0, 2.0));
        assert_eq!(t.max_scale(), 3.0);
    }

    #[test]
    fn test_direction_vectors() {
        let t = Transform::default();
        assert_eq!(t.forward(), Vec3::NEG_Z);
        assert_eq!(t.right(), Vec3::X);
        assert_eq!(t.up(), Vec3::Y);
    }

    #[test]
    fn test_normal_matrix_with_scale() {
        let model = Transform::new()
            .with_scale(Vec3::new(1.0, 2.0, 1.0))
            .local_matrix();
        assert_eq!(normal_matrix(model), model.inverse().transpose());
    }

    #[test]
    fn test_normal_matrix_non_invertible() {
        let model = Transform::new().with_scale(Vec3::ZERO).local_matrix();
        let normal = normal_matrix(model);
        assert_eq!(normal, Mat4::IDENTITY);
        assert!(!normal.is_nan());
    }
}
