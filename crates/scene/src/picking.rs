//! Ray casting against pickable scene nodes.
//!
//! Planets are spheres, so every pickable node is tested as a bounding
//! sphere: its world position and `pick_radius` scaled by the largest world
//! scale axis.

use glam::{Mat4, Vec3};

use crate::graph::{NodeId, SceneGraph};

/// Half-line `origin + t * direction` for `t >= 0`. `direction` is unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Build a ray; returns `None` for a zero or non-finite direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        origin.is_finite().then_some(Self { origin, direction })
    }

    /// Ray from `from` through `to`.
    pub fn through(from: Vec3, to: Vec3) -> Option<Self> {
        Self::new(from, to - from)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Nearest hit of a raycast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

/// Distance along `ray` to the first intersection with a sphere.
///
/// When the origin is inside the sphere the exit distance is returned.
/// Spheres entirely behind the origin are missed.
pub fn intersect_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    if radius <= 0.0 {
        return None;
    }
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let near = -b - sqrt_d;
    let far = -b + sqrt_d;
    if near >= 0.0 {
        Some(near)
    } else if far >= 0.0 {
        Some(far)
    } else {
        None
    }
}

/// Largest axis scale of a world matrix.
fn max_axis_scale(world: &Mat4) -> f32 {
    world
        .x_axis
        .truncate()
        .length()
        .max(world.y_axis.truncate().length())
        .max(world.z_axis.truncate().length())
}

/// Closest visible, pickable node hit by `ray`.
pub fn raycast(graph: &SceneGraph, ray: &Ray) -> Option<Hit> {
    graph
        .visible_renderables()
        .into_iter()
        .filter(|v| v.renderable.pickable)
        .filter_map(|v| {
            let center = v.world.transform_point3(Vec3::ZERO);
            let radius = v.renderable.pick_radius * max_axis_scale(&v.world);
            intersect_sphere(ray, center, radius).map(|distance| Hit {
                node: v.id,
                distance,
                point: ray.at(distance),
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}
