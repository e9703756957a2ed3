//! Surface description shared by planets, the sun, rings and the ship.

use std::path::{Path, PathBuf};

use glam::Vec3;

/// Texture plus color. Unlit materials ignore the scene light.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: Vec3,
    pub texture: Option<PathBuf>,
    pub unlit: bool,
}

impl Material {
    pub fn new(name: impl Into<String>, base_color: Vec3) -> Self {
        Self {
            name: name.into(),
            base_color,
            texture: None,
            unlit: false,
        }
    }

    pub fn with_texture(mut self, texture: impl Into<PathBuf>) -> Self {
        self.texture = Some(texture.into());
        self
    }

    pub fn unlit(mut self) -> Self {
        self.unlit = true;
        self
    }

    /// Texture path resolved against `root`. Absolute paths are kept.
    pub fn texture_path(&self, root: &Path) -> Option<PathBuf> {
        self.texture.as_ref().map(|t| {
            if t.is_absolute() {
                t.clone()
            } else {
                root.join(t)
            }
        })
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default", Vec3::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_path_resolution() {
        let root = Path::new("assets");
        let m = Material::new("earth", Vec3::ONE).with_texture("textures/earth.jpg");
        assert_eq!(
            m.texture_path(root),
            Some(PathBuf::from("assets/textures/earth.jpg"))
        );
        assert_eq!(Material::default().texture_path(root), None);
    }

    #[test]
    fn test_builder() {
        let m = Material::new("sun", Vec3::new(1.0, 0.8, 0.3)).unlit();
        assert!(m.unlit);
        assert_eq!(m.name, "sun");
    }
}
