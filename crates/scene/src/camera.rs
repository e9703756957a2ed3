//! Perspective camera and cursor unprojection.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4Swizzles};

use orrery_core::CameraConfig;

use crate::picking::Ray;

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

/// A camera for rendering and picking.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub projection: Projection,
}

impl Default for Camera {
    /// 75° field of view, clip planes 0.1..200, seven units back from the sun.
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 7.0),
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: 75.0_f32.to_radians(),
                aspect: 16.0 / 9.0,
                near: 0.1,
                far: 200.0,
            },
        }
    }
}

/// Overview camera position: above the orbital plane and back along +Z.
pub fn overview_position(config: &CameraConfig) -> Vec3 {
    Vec3::new(0.0, config.overview_height, config.start_distance)
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Perspective camera configured from `config`, placed at the overview
    /// position looking at the origin.
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            position: overview_position(config),
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: config.fov_y_degrees.to_radians(),
                aspect,
                near: config.near,
                far: config.far,
            },
        };
        camera.look_at(Vec3::ZERO);
        camera
    }

    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective {
            fov_y,
            aspect,
            near,
            far,
        };
    }

    /// Update the aspect ratio after a resize. No-op for orthographic.
    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = &mut self.projection
            && aspect.is_finite()
            && aspect > 0.0
        {
            *a = aspect;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), self.up())
    }

    /// Projection matrix with the Y axis flipped for Vulkan clip space.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = match self.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        };
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
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

    /// Turn to face `target`, keeping world +Y as up.
    pub fn look_at(&mut self, target: Vec3) {
        let Some(forward) = (target - self.position).try_normalize() else {
            return;
        };
        // Looking straight up or down: any yaw will do, keep roll-free.
        if forward.cross(Vec3::Y).length_squared() < 1e-8 {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, forward);
            return;
        }
        let view = Mat4::look_to_rh(Vec3::ZERO, forward, Vec3::Y);
        self.rotation = Quat::from_mat4(&view.inverse());
    }

    /// World point at `depth` (0 = near plane, 1 = far plane) under a pixel.
    pub fn unproject(&self, screen_pos: Vec2, viewport: Vec2, depth: f32) -> Option<Vec3> {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }
        // Vulkan NDC has +Y down, matching window coordinates once the
        // projection has been flipped.
        let ndc_x = 2.0 * screen_pos.x / viewport.x - 1.0;
        let ndc_y = 2.0 * screen_pos.y / viewport.y - 1.0;

        let inv = self.view_projection_matrix().inverse();
        let world = inv * glam::Vec4::new(ndc_x, ndc_y, depth, 1.0);
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        Some(world.xyz() / world.w)
    }

    /// Ray from the near plane through the pixel at `screen_pos`.
    pub fn screen_ray(&self, screen_pos: Vec2, viewport: Vec2) -> Option<Ray> {
        let near = self.unproject(screen_pos, viewport, 0.0)?;
        let far = self.unproject(screen_pos, viewport, 1.0)?;
        Ray::through(near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_vec3(a: Vec3, b: Vec3, eps: f32) -> bool {
        (a - b).abs().max_element() < eps
    }

    #[test]
    fn test_default_matches_initial_view() {
        let cam = Camera::default();
        assert_eq!(cam.position, Vec3::new(0.0, 0.0, 7.0));
        match cam.projection {
            Projection::Perspective {
                fov_y, near, far, ..
            } => {
                assert!((fov_y - 75.0_f32.to_radians()).abs() < 1e-6);
                assert_eq!(near, 0.1);
                assert_eq!(far, 200.0);
            }
            _ => panic!("expected perspective"),
        }
    }

    #[test]
    fn test_look_at_keeps_up() {
        let mut cam = Camera::new();
        cam.position = Vec3::new(10.0, 10.0, 10.0);
        cam.look_at(Vec3::ZERO);

        let expected = (-cam.position).normalize();
        assert!(approx_eq_vec3(cam.forward(), expected, 1e-5));
        assert!(cam.right().y.abs() < 1e-5, "no roll: {:?}", cam.right());
        assert!(cam.up().y > 0.0);
    }

    #[test]
    fn test_look_at_straight_down() {
        let mut cam = Camera::new();
        cam.position = Vec3::new(0.0, 10.0, 0.0);
        cam.look_at(Vec3::ZERO);
        assert!(approx_eq_vec3(cam.forward(), Vec3::NEG_Y, 1e-5));
    }

    #[test]
    fn test_center_ray_points_forward() {
        let cam = Camera::default();
        let viewport = Vec2::new(800.0, 600.0);
        let ray = cam.screen_ray(viewport * 0.5, viewport).unwrap();
        assert!(approx_eq_vec3(ray.direction, Vec3::NEG_Z, 1e-4));
        assert!((ray.origin.z - (7.0 - 0.1)).abs() < 1e-3);
    }

    #[test]
    fn test_top_of_screen_ray_points_up() {
        let cam = Camera::default();
        let viewport = Vec2::new(800.0, 600.0);
        let ray = cam.screen_ray(Vec2::new(400.0, 0.0), viewport).unwrap();
        assert!(ray.direction.y > 0.0, "got {:?}", ray.direction);

        // The top edge sits at half the vertical field of view.
        let angle = ray.direction.angle_between(Vec3::NEG_Z);
        assert!((angle - 37.5_f32.to_radians()).abs() < 1e-3);
    }

    #[test]
    fn test_left_of_screen_ray_points_left() {
        let cam = Camera::default();
        let viewport = Vec2::new(800.0, 600.0);
        let ray = cam.screen_ray(Vec2::new(0.0, 300.0), viewport).unwrap();
        assert!(ray.direction.x < 0.0);
    }

    #[test]
    fn test_projects_back_to_pixel() {
        let mut cam = Camera::new();
        cam.position = Vec3::new(3.0, 4.0, 12.0);
        cam.look_at(Vec3::new(1.0, 0.0, 0.0));
        let viewport = Vec2::new(1280.0, 720.0);
        let pixel = Vec2::new(900.0, 200.0);

        let ray = cam.screen_ray(pixel, viewport).unwrap();
        let clip = cam.view_projection_matrix() * ray.at(20.0).extend(1.0);
        let ndc = clip.xyz() / clip.w;
        let back = Vec2::new((ndc.x + 1.0) * 0.5 * viewport.x, (ndc.y + 1.0) * 0.5 * viewport.y);
        assert!((back - pixel).length() < 0.5, "got {back:?}");
    }

    #[test]
    fn test_empty_viewport_has_no_ray() {
        let cam = Camera::default();
        assert!(cam.screen_ray(Vec2::ZERO, Vec2::ZERO).is_none());
    }

    #[test]
    fn test_set_aspect_rejects_invalid() {
        let mut cam = Camera::default();
        cam.set_aspect(2.0);
        cam.set_aspect(f32::NAN);
        match cam.projection {
            Projection::Perspective { aspect, .. } => assert_eq!(aspect, 2.0),
            _ => panic!("expected perspective"),
        }
    }
}
