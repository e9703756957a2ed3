//! Asset loading and procedural geometry.
//!
//! - Procedural meshes: UV sphere, orbit ring, ship hull
//! - glTF model loading
//! - Texture decoding
//! - Material definitions

pub mod error;
pub mod material;
pub mod mesh;
pub mod model;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use material::Material;
pub use mesh::{MeshData, Topology};
pub use model::Model;
pub use texture::TextureData;
