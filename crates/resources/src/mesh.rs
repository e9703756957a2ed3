//! CPU-side mesh data and the procedural meshes the scene is built from.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

/// How indices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    #[default]
    Triangles,
    LineStrip,
}

/// Vertex attributes as parallel arrays plus an index list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

impl MeshData {
    /// Unit-radius UV sphere centred on the origin, CCW-outward.
    ///
    /// Texture `v = 0` is the north pole, matching equirectangular planet maps.
    pub fn uv_sphere(segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let stride = segments + 1;

        let mut mesh = Self::default();
        for r in 0..=rings {
            let v = r as f32 / rings as f32;
            let theta = v * PI;
            let (sin_t, cos_t) = theta.sin_cos();
            for s in 0..=segments {
                let u = s as f32 / segments as f32;
                let (sin_p, cos_p) = (u * TAU).sin_cos();
                let p = Vec3::new(sin_t * cos_p, cos_t, -sin_t * sin_p);
                mesh.positions.push(p);
                mesh.normals.push(p);
                mesh.tex_coords.push(Vec2::new(u, v));
            }
        }

        for r in 0..rings {
            for s in 0..segments {
                let a = r * stride + s;
                let b = a + stride;
                let c = a + 1;
                let d = b + 1;
                // Skip the triangles that collapse onto a pole.
                if r != 0 {
                    mesh.indices.extend_from_slice(&[a, b, c]);
                }
                if r != rings - 1 {
                    mesh.indices.extend_from_slice(&[c, b, d]);
                }
            }
        }
        mesh
    }

    /// Unit circle in the XZ plane as a closed line strip.
    pub fn orbit_ring(segments: u32) -> Self {
        let segments = segments.max(3);
        let mut mesh = Self {
            topology: Topology::LineStrip,
            ..Self::default()
        };
        for i in 0..=segments {
            let t = i as f32 / segments as f32;
            let (sin, cos) = (t * TAU).sin_cos();
            mesh.positions.push(Vec3::new(cos, 0.0, -sin));
            mesh.normals.push(Vec3::Y);
            mesh.tex_coords.push(Vec2::new(t, 0.0));
            mesh.indices.push(i);
        }
        mesh
    }

    /// Flat-shaded dart hull, nose toward -Z, about two units long.
    pub fn ship() -> Self {
        let nose = Vec3::new(0.0, 0.0, -1.0);
        let left = Vec3::new(-0.6, 0.0, 0.6);
        let right = Vec3::new(0.6, 0.0, 0.6);
        let top = Vec3::new(0.0, 0.3, 0.4);
        let bottom = Vec3::new(0.0, -0.2, 0.4);

        let faces = [
            [nose, left, top],
            [nose, top, right],
            [nose, bottom, left],
            [nose, right, bottom],
            [left, right, top],
            [left, bottom, right],
        ];

        let mut mesh = Self::default();
        for face in faces {
            let normal = (face[1] - face[0]).cross(face[2] - face[0]).normalize();
            for (corner, uv) in face.into_iter().zip([Vec2::ZERO, Vec2::X, Vec2::Y]) {
                mesh.indices.push(mesh.positions.len() as u32);
                mesh.positions.push(corner);
                mesh.normals.push(normal);
                mesh.tex_coords.push(uv);
            }
        }
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles, zero for line meshes.
    pub fn triangle_count(&self) -> usize {
        match self.topology {
            Topology::Triangles => self.indices.len() / 3,
            Topology::LineStrip => 0,
        }
    }

    /// Axis-aligned bounds, `None` for an empty mesh.
    pub fn aabb(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), &p| (min.min(p), max.max(p))),
        )
    }

    pub fn center(&self) -> Vec3 {
        self.aabb()
            .map(|(min, max)| (min + max) * 0.5)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn size(&self) -> Vec3 {
        self.aabb()
            .map(|(min, max)| max - min)
            .unwrap_or(Vec3::ZERO)
    }

    /// Check attribute arrays agree and indices are in range.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.positions.len();
        if self.normals.len() != n || self.tex_coords.len() != n {
            return Err(format!(
                "attribute count mismatch: {} positions, {} normals, {} uvs",
                n,
                self.normals.len(),
                self.tex_coords.len()
            ));
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(format!("index {bad} out of range for {n} vertices"));
        }
        if self.topology == Topology::Triangles && self.indices.len() % 3 != 0 {
            return Err(format!("{} indices is not whole triangles", self.indices.len()));
        }
        Ok(())
    }

    /// Replace normals with area-weighted vertex normals from the triangles.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
            let (Some(&pa), Some(&pb), Some(&pc)) = (
                self.positions.get(a),
                self.positions.get(b),
                self.positions.get(c),
            ) else {
                continue;
            };
            let n = (pb - pa).cross(pc - pa);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
            .collect();
    }

    /// Translate and uniformly scale so the mesh is centred on the origin and
    /// its longest side is `extent`.
    pub fn normalize_to(&mut self, extent: f32) {
        let size = self.size().max_element();
        if size <= f32::EPSILON {
            return;
        }
        let center = self.center();
        let scale = extent / size;
        for p in &mut self.positions {
            *p = (*p - center) * scale;
        }
    }

    /// Append `other`, offsetting its indices.
    pub fn append(&mut self, other: &MeshData) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.tex_coords.extend_from_slice(&other.tex_coords);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangles(mesh: &MeshData) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        mesh.indices.chunks_exact(3).map(|t| {
            [
                mesh.positions[t[0] as usize],
                mesh.positions[t[1] as usize],
                mesh.positions[t[2] as usize],
            ]
        })
    }

    #[test]
    fn test_sphere_counts() {
        let mesh = MeshData::uv_sphere(32, 16);
        assert_eq!(mesh.vertex_count(), 33 * 17);
        assert_eq!(mesh.triangle_count(), 2 * 32 * 15);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_sphere_is_unit_and_outward() {
        let mesh = MeshData::uv_sphere(24, 12);
        for (p, n) in mesh.positions.iter().zip(&mesh.normals) {
            assert!((p.length() - 1.0).abs() < 1e-5);
            assert!((*p - *n).length() < 1e-6);
        }
        for [a, b, c] in triangles(&mesh) {
            let normal = (b - a).cross(c - a);
            assert!(normal.length() > 1e-8, "degenerate triangle");
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "inward-facing triangle");
        }
    }

    #[test]
    fn test_sphere_uv_poles() {
        let mesh = MeshData::uv_sphere(8, 4);
        assert_eq!(mesh.tex_coords[0], Vec2::ZERO);
        assert!((mesh.positions[0] - Vec3::Y).length() < 1e-6);
        let last = mesh.vertex_count() - 1;
        assert_eq!(mesh.tex_coords[last], Vec2::ONE);
        assert!((mesh.positions[last] - Vec3::NEG_Y).length() < 1e-6);
    }

    #[test]
    fn test_sphere_minimums() {
        let mesh = MeshData::uv_sphere(0, 0);
        assert!(mesh.validate().is_ok());
        assert!(mesh.triangle_count() > 0);
    }

    #[test]
    fn test_orbit_ring_closed() {
        let mesh = MeshData::orbit_ring(64);
        assert_eq!(mesh.topology, Topology::LineStrip);
        assert_eq!(mesh.indices.len(), 65);
        assert_eq!(mesh.triangle_count(), 0);
        let first = mesh.positions[0];
        let last = mesh.positions[64];
        assert!((first - last).length() < 1e-5);
        assert!(mesh.positions.iter().all(|p| (p.length() - 1.0).abs() < 1e-5 && p.y == 0.0));
    }

    #[test]
    fn test_ship_hull_outward() {
        let mesh = MeshData::ship();
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.triangle_count(), 6);

        let interior =
            mesh.positions.iter().copied().sum::<Vec3>() / mesh.positions.len() as f32;
        for [a, b, c] in triangles(&mesh) {
            let normal = (b - a).cross(c - a);
            assert!(normal.dot((a + b + c) / 3.0 - interior) > 0.0);
        }
        assert!(mesh.aabb().unwrap().0.z <= -1.0, "nose points to -Z");
    }

    #[test]
    fn test_aabb_center_size() {
        let mut mesh = MeshData::default();
        assert!(mesh.aabb().is_none());
        assert_eq!(mesh.center(), Vec3::ZERO);

        mesh.positions = vec![Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, 4.0, -2.0)];
        assert_eq!(mesh.center(), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(mesh.size(), Vec3::new(4.0, 4.0, 4.0));
    }

    #[test]
    fn test_normalize_to() {
        let mut mesh = MeshData::ship();
        mesh.normalize_to(2.0);
        assert!((mesh.size().max_element() - 2.0).abs() < 1e-5);
        assert!(mesh.center().length() < 1e-5);
    }

    #[test]
    fn test_compute_normals_flat_quad() {
        let mut mesh = MeshData {
            positions: vec![
                Vec3::ZERO,
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 1.0),
            ],
            tex_coords: vec![Vec2::ZERO; 4],
            indices: vec![0, 1, 2, 2, 1, 3],
            ..Default::default()
        };
        mesh.compute_normals();
        assert!(mesh.normals.iter().all(|n| (*n - Vec3::Y).length() < 1e-6));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_bad_index() {
        let mut mesh = MeshData::ship();
        mesh.indices[0] = 999;
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_append_offsets_indices() {
        let mut a = MeshData::ship();
        let b = MeshData::ship();
        let n = a.vertex_count() as u32;
        a.append(&b);
        assert_eq!(a.triangle_count(), 12);
        assert_eq!(a.indices[18], n);
        assert!(a.validate().is_ok());
    }
}
