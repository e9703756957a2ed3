//! Shader-facing data: the per-frame uniform block and per-draw push
//! constants.
//!
//! Both structures mirror the GLSL declarations in `shaders/mesh.vert` and
//! `shaders/mesh.frag` (std140 / std430 with every member 16-byte aligned).

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use orrery_scene::Lighting;

/// Per-frame uniform data (set 0, binding 0).
///
/// # Memory Layout
///
/// - Offset 0: view matrix (64 bytes)
/// - Offset 64: projection matrix (64 bytes)
/// - Offset 128: view-projection matrix (64 bytes)
/// - Offset 192: camera position, w unused (16 bytes)
/// - Offset 208: light position (xyz) and radius (w)
/// - Offset 224: light color (rgb) and intensity (w)
/// - Offset 240: ambient color, w unused
/// - Total size: 256 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FrameUbo {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec4,
    pub light_position_radius: Vec4,
    pub light_color_intensity: Vec4,
    pub ambient: Vec4,
}

impl FrameUbo {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(view: Mat4, projection: Mat4, camera_position: Vec3, lighting: &Lighting) -> Self {
        let sun = &lighting.sun;
        Self {
            view,
            projection,
            view_projection: projection * view,
            camera_position: camera_position.extend(1.0),
            light_position_radius: sun.position.extend(sun.radius),
            light_color_intensity: sun.color.extend(sun.intensity),
            ambient: lighting.ambient.extend(0.0),
        }
    }
}

/// Skip lighting; the fragment takes the tint (times texture) as is.
pub const DRAW_FLAG_UNLIT: u32 = 1;

/// Per-draw push constants, visible to both stages.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: tint (16 bytes)
/// - Offset 80: flags, x used (16 bytes)
/// - Total size: 96 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawPush {
    pub model: Mat4,
    pub tint: Vec4,
    pub flags: [u32; 4],
}

impl DrawPush {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(model: Mat4, tint: Vec3, unlit: bool) -> Self {
        let flags = if unlit { DRAW_FLAG_UNLIT } else { 0 };
        Self {
            model,
            tint: tint.extend(1.0),
            flags: [flags, 0, 0, 0],
        }
    }

    pub fn is_unlit(&self) -> bool {
        self.flags[0] & DRAW_FLAG_UNLIT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_scene::PointLight;

    #[test]
    fn test_frame_ubo_size() {
        assert_eq!(FrameUbo::SIZE, 256);
        assert_eq!(FrameUbo::SIZE % 16, 0);
    }

    #[test]
    fn test_frame_ubo_offsets() {
        assert_eq!(std::mem::offset_of!(FrameUbo, camera_position), 192);
        assert_eq!(std::mem::offset_of!(FrameUbo, light_position_radius), 208);
        assert_eq!(std::mem::offset_of!(FrameUbo, ambient), 240);
    }

    #[test]
    fn test_frame_ubo_packs_lighting() {
        let lighting = Lighting {
            sun: PointLight {
                position: Vec3::new(1.0, 2.0, 3.0),
                radius: 50.0,
                color: Vec3::ONE,
                intensity: 2.0,
            },
            ambient: Vec3::splat(0.1),
        };
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -7.0));
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 200.0);
        let ubo = FrameUbo::new(view, proj, Vec3::Z * 7.0, &lighting);

        assert_eq!(ubo.view_projection, proj * view);
        assert_eq!(ubo.light_position_radius, Vec4::new(1.0, 2.0, 3.0, 50.0));
        assert_eq!(ubo.light_color_intensity.w, 2.0);
        assert_eq!(ubo.camera_position.w, 1.0);
    }

    #[test]
    fn test_draw_push_fits_minimum_push_constant_limit() {
        assert_eq!(DrawPush::SIZE, 96);
        assert!(DrawPush::SIZE <= 128);
    }

    #[test]
    fn test_draw_push_flags() {
        let lit = DrawPush::new(Mat4::IDENTITY, Vec3::ONE, false);
        let unlit = DrawPush::new(Mat4::IDENTITY, Vec3::ONE, true);
        assert!(!lit.is_unlit());
        assert!(unlit.is_unlit());
        assert_eq!(unlit.tint.w, 1.0);
    }
}
