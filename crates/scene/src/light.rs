//! Scene lighting: a point light at the sun plus a flat ambient term.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Omnidirectional light, laid out for direct upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PointLight {
    pub position: Vec3,
    /// Distance at which the contribution fades to zero.
    pub radius: f32,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 200.0,
            color: Vec3::new(1.0, 0.95, 0.85),
            intensity: 1.6,
        }
    }
}

impl PointLight {
    /// Smooth falloff: 1 at the light, 0 at `radius` and beyond.
    pub fn attenuation(&self, point: Vec3) -> f32 {
        if self.radius <= 0.0 {
            return 0.0;
        }
        let x = (point.distance(self.position) / self.radius).clamp(0.0, 1.0);
        let falloff = 1.0 - x * x;
        falloff * falloff
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub sun: PointLight,
    /// Added to every lit surface so night sides stay readable.
    pub ambient: Vec3,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            sun: PointLight::default(),
            ambient: Vec3::splat(0.08),
        }
    }
}
