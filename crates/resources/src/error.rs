//! Error types for asset loading.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to load glTF file '{path}': {message}")]
    GltfLoad { path: PathBuf, message: String },

    #[error("glTF file '{0}' contains no triangle meshes")]
    NoMeshes(PathBuf),

    #[error("Mesh primitive has no position data")]
    NoPositionData,

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

pub type ResourceResult<T> = Result<T, ResourceError>;
