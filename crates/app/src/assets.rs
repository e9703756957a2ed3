//! Upload the meshes and textures the world is built from.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::Vec3;
use tracing::{info, warn};

use orrery_core::Config;
use orrery_renderer::Renderer;
use orrery_resources::{Material, MeshData, Model, TextureData};
use orrery_scene::{
    BodyMaterial, MaterialId, PlanetDescriptor, SunDescriptor, SystemAssets, SystemDescriptor,
};

use crate::world::WorldAssets;

const SPHERE_SEGMENTS: u32 = 48;
const SPHERE_RINGS: u32 = 24;
const RING_SEGMENTS: u32 = 128;
/// Longest side of an imported ship model before `spaceship.scale`.
const SHIP_EXTENT: f32 = 1.0;

const WHITE: [u8; 4] = [255, 255, 255, 255];

pub fn sun_material(desc: &SunDescriptor) -> Material {
    let material = Material::new(desc.name.as_str(), Vec3::from(desc.color)).unlit();
    match &desc.texture {
        Some(path) => material.with_texture(path),
        None => material,
    }
}

pub fn planet_material(desc: &PlanetDescriptor) -> Material {
    let material = Material::new(desc.name.as_str(), Vec3::from(desc.color));
    match &desc.texture {
        Some(path) => material.with_texture(path),
        None => material,
    }
}

/// Pixels for `material`, or `None` when it has no texture or the file
/// cannot be read. Bodies without pixels are drawn white and tinted with
/// their descriptor color.
pub fn texture_for(material: &Material, root: &Path) -> Option<TextureData> {
    let path = material.texture_path(root)?;
    match TextureData::load(&path) {
        Ok(texture) => Some(texture),
        Err(e) => {
            warn!(
                "Texture {} unavailable ({e}), {} uses its plain color",
                path.display(),
                material.name
            );
            None
        }
    }
}

/// Upload `material`'s texture, falling back to the shared `white` one.
fn upload_material(
    renderer: &mut Renderer,
    material: &Material,
    root: &Path,
    white: MaterialId,
) -> Result<BodyMaterial> {
    match texture_for(material, root) {
        Some(texture) => renderer
            .upload_texture(&texture)
            .map(BodyMaterial::textured)
            .with_context(|| format!("uploading texture for {}", material.name)),
        None => Ok(BodyMaterial::plain(white)),
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Ship geometry and its color: the configured glTF model when it loads,
/// the procedural hull otherwise.
pub fn ship_mesh(config: &Config) -> (MeshData, Option<Vec3>) {
    let Some(model_path) = &config.spaceship.model else {
        return (MeshData::ship(), None);
    };
    let path = resolve(&config.system.asset_root, model_path);
    match Model::load(&path) {
        Ok(model) => {
            info!(
                "Loaded ship model {} ({} triangles)",
                path.display(),
                model.total_triangle_count()
            );
            (model.merged(SHIP_EXTENT), model.base_colors.first().copied())
        }
        Err(e) => {
            warn!("Ship model {} unavailable ({e}), using built-in hull", path.display());
            (MeshData::ship(), None)
        }
    }
}

pub fn upload(
    renderer: &mut Renderer,
    config: &Config,
    descriptor: &SystemDescriptor,
) -> Result<WorldAssets> {
    let root = config.system.asset_root.as_path();

    let sphere = renderer
        .upload_mesh(&MeshData::uv_sphere(SPHERE_SEGMENTS, SPHERE_RINGS))
        .context("uploading sphere mesh")?;
    let ring_mesh = renderer
        .upload_mesh(&MeshData::orbit_ring(RING_SEGMENTS))
        .context("uploading orbit ring mesh")?;
    let (ship_data, ship_color) = ship_mesh(config);
    let ship_mesh = renderer
        .upload_mesh(&ship_data)
        .context("uploading ship mesh")?;

    let white = renderer
        .upload_texture(&TextureData::solid(WHITE))
        .context("uploading white texture")?;

    let sun = upload_material(renderer, &sun_material(&descriptor.sun), root, white)?;
    let planet_materials = descriptor
        .planets
        .iter()
        .map(|desc| upload_material(renderer, &planet_material(desc), root, white))
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Uploaded {} meshes and {} textures",
        renderer.mesh_count(),
        renderer.material_count()
    );

    Ok(WorldAssets {
        system: SystemAssets {
            sphere,
            ring: Some((ring_mesh, white)),
            sun_material: sun,
            planet_materials,
        },
        ship_mesh,
        ship_material: white,
        ship_color,
    })
}
