//! glTF model loading for the spaceship.

use std::path::Path;

use glam::{Mat3, Mat4, Vec2, Vec3};
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::MeshData;

/// A model flattened into world-space meshes, one per triangle primitive.
#[derive(Debug, Default)]
pub struct Model {
    pub meshes: Vec<MeshData>,
    /// Base color factor of each mesh's material.
    pub base_colors: Vec<Vec3>,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
}

impl Model {
    /// Load a `.gltf` or `.glb` file, applying node transforms.
    ///
    /// Non-triangle primitives are skipped. Missing normals are computed from
    /// the triangles; missing texture coordinates are zeroed.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let (document, buffers, _images) =
            gltf::import(path).map_err(|e| ResourceError::GltfLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut model = Self::default();
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next());

        match scene {
            Some(scene) => {
                for node in scene.nodes() {
                    model.visit(&node, Mat4::IDENTITY, &buffers)?;
                }
            }
            // No scene graph: take meshes as authored.
            None => {
                for mesh in document.meshes() {
                    model.add_mesh(&mesh, Mat4::IDENTITY, &buffers)?;
                }
            }
        }

        if model.meshes.is_empty() {
            return Err(ResourceError::NoMeshes(path.to_path_buf()));
        }
        model.update_bounds();

        info!(
            "Loaded model {} ({} meshes, {} vertices, {} triangles)",
            path.display(),
            model.meshes.len(),
            model.total_vertex_count(),
            model.total_triangle_count()
        );
        Ok(model)
    }

    fn visit(
        &mut self,
        node: &gltf::Node<'_>,
        parent: Mat4,
        buffers: &[gltf::buffer::Data],
    ) -> ResourceResult<()> {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            self.add_mesh(&mesh, world, buffers)?;
        }
        for child in node.children() {
            self.visit(&child, world, buffers)?;
        }
        Ok(())
    }

    fn add_mesh(
        &mut self,
        mesh: &gltf::Mesh<'_>,
        transform: Mat4,
        buffers: &[gltf::buffer::Data],
    ) -> ResourceResult<()> {
        let normal_transform = Mat3::from_mat4(transform).inverse().transpose();

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                debug!("Skipping {:?} primitive in {:?}", primitive.mode(), mesh.name());
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));

            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or(ResourceError::NoPositionData)?
                .map(|p| transform.transform_point3(Vec3::from(p)))
                .collect();
            let count = positions.len();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..count as u32).collect(),
            };

            let tex_coords: Vec<Vec2> = reader
                .read_tex_coords(0)
                .map(|uv| uv.into_f32().map(Vec2::from).collect())
                .unwrap_or_else(|| vec![Vec2::ZERO; count]);

            let mut data = MeshData {
                positions,
                normals: Vec::new(),
                tex_coords,
                indices,
                ..MeshData::default()
            };
            match reader.read_normals() {
                Some(normals) => {
                    data.normals = normals
                        .map(|n| {
                            (normal_transform * Vec3::from(n))
                                .try_normalize()
                                .unwrap_or(Vec3::Y)
                        })
                        .collect();
                }
                None => data.compute_normals(),
            }
            data.validate().map_err(ResourceError::InvalidMesh)?;

            let [r, g, b, _] = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();
            self.base_colors.push(Vec3::new(r, g, b));
            self.meshes.push(data);
        }
        Ok(())
    }

    fn update_bounds(&mut self) {
        let bounds = self
            .meshes
            .iter()
            .filter_map(MeshData::aabb)
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)));
        if let Some((min, max)) = bounds {
            self.aabb_min = min;
            self.aabb_max = max;
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.aabb_min + self.aabb_max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.aabb_max - self.aabb_min
    }

    pub fn total_vertex_count(&self) -> usize {
        self.meshes.iter().map(MeshData::vertex_count).sum()
    }

    pub fn total_triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshData::triangle_count).sum()
    }

    /// Merge every mesh into one, centred and scaled so its longest side is
    /// `extent`. Meshes keep their geometry but lose per-mesh colors.
    pub fn merged(&self, extent: f32) -> MeshData {
        let mut out = MeshData::default();
        for mesh in &self.meshes {
            out.append(mesh);
        }
        out.normalize_to(extent);
        out
    }

    /// Model wrapping a single procedural mesh.
    pub fn from_mesh(mesh: MeshData, color: Vec3) -> Self {
        let mut model = Self {
            meshes: vec![mesh],
            base_colors: vec![color],
            ..Self::default()
        };
        model.update_bounds();
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let err = Model::load(Path::new("no/such/ship.glb"));
        assert!(matches!(err, Err(ResourceError::FileNotFound(_))));
    }

    #[test]
    fn test_from_mesh_bounds() {
        let model = Model::from_mesh(MeshData::ship(), Vec3::ONE);
        assert_eq!(model.total_triangle_count(), 6);
        assert_eq!(model.total_vertex_count(), 18);
        assert_eq!(model.aabb_min.z, -1.0);
        assert!((model.size().x - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_merged_is_normalized() {
        let mut model = Model::from_mesh(MeshData::uv_sphere(8, 4), Vec3::ONE);
        model.meshes.push(MeshData::ship());
        model.update_bounds();

        let merged = model.merged(1.0);
        assert_eq!(merged.vertex_count(), model.total_vertex_count());
        assert!((merged.size().max_element() - 1.0).abs() < 1e-5);
        assert!(merged.validate().is_ok());
    }
}
