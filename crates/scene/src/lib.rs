//! Scene graph and the solar-system simulation that lives in it.
//!
//! - Arena scene graph with local transforms and renderables
//! - Camera, camera modes and cursor picking
//! - Planet orbits, hover highlighting and click boosts
//! - The keyboard-flown spaceship

pub mod camera;
pub mod graph;
pub mod interaction;
pub mod light;
pub mod picking;
pub mod rig;
pub mod solar;
pub mod spaceship;
pub mod transform;

pub use camera::{Camera, Projection, overview_position};
pub use graph::{
    MaterialId, MeshId, Node, NodeId, Renderable, SceneError, SceneGraph, SceneResult, VisibleNode,
};
pub use interaction::{HoverState, SpeedBoosts};
pub use light::{Lighting, PointLight};
pub use picking::{Hit, Ray, intersect_sphere, raycast};
pub use rig::{CameraMode, CameraRig, RigInput};
pub use solar::{
    BodyMaterial, PlanetDescriptor, PlanetHandle, SolarSystem, SunDescriptor, SystemAssets,
    SystemDescriptor,
};
pub use spaceship::{ShipInput, ShipPose, Spaceship, smoothing_factor};
pub use transform::{Transform, normal_matrix};
