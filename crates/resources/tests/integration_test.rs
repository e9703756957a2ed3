//! Integration tests for model loading.

use std::path::Path;

use glam::Vec3;
use orrery_resources::{Model, ResourceError};

#[test]
fn test_load_embedded_triangle() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/triangle.gltf");
    let model = Model::load(&path).expect("Failed to load glTF model");

    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.total_vertex_count(), 3);
    assert_eq!(model.total_triangle_count(), 1);
    assert_eq!(model.base_colors, vec![Vec3::new(0.5, 0.25, 1.0)]);

    let mesh = &model.meshes[0];
    // The node's translation is baked in.
    assert!(mesh.positions.iter().all(|p| (p.y - 1.0).abs() < 1e-6));
    // No normals in the file: computed from the winding (CCW seen from +Y).
    assert!(mesh.normals.iter().all(|n| (*n - Vec3::Y).length() < 1e-6));
    assert_eq!(mesh.tex_coords.len(), 3);

    assert_eq!(model.aabb_min, Vec3::new(0.0, 1.0, -1.0));
    assert_eq!(model.aabb_max, Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn test_load_ship_asset() {
    let model_path = Path::new("../../assets/models/ship.glb");

    // Skip when the optional ship model is not checked out.
    if !model_path.exists() {
        println!("Skipping test: model file not found at {:?}", model_path);
        return;
    }

    let model = Model::load(model_path).expect("Failed to load glTF model");
    assert!(!model.meshes.is_empty());
    for (i, mesh) in model.meshes.iter().enumerate() {
        assert!(mesh.validate().is_ok(), "Mesh {} is inconsistent", i);
    }
    let merged = model.merged(2.0);
    assert!((merged.size().max_element() - 2.0).abs() < 1e-4);
}

#[test]
fn test_missing_model_is_reported() {
    let err = Model::load(Path::new("missing.gltf")).unwrap_err();
    assert!(matches!(err, ResourceError::FileNotFound(_)));
}
