//! Vertex layout shared by every mesh pipeline.
//!
//! # Memory Layout
//!
//! - Offset 0: position (12 bytes), location 0
//! - Offset 12: normal (12 bytes), location 1
//! - Offset 24: tex_coord (8 bytes), location 2
//! - Total size: 32 bytes

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, normal) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, tex_coord) as u32,
            },
        ]
    }
}

/// Interleave separate attribute streams. Missing normals default to +Y and
/// missing texture coordinates to zero.
pub fn interleave(positions: &[Vec3], normals: &[Vec3], tex_coords: &[Vec2]) -> Vec<Vertex> {
    positions
        .iter()
        .enumerate()
        .map(|(i, &position)| Vertex {
            position,
            normal: normals.get(i).copied().unwrap_or(Vec3::Y),
            tex_coord: tex_coords.get(i).copied().unwrap_or(Vec2::ZERO),
        })
        .collect()
}
