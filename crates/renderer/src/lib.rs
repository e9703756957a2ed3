//! Frame orchestration on top of the RHI.
//!
//! This crate turns a scene snapshot into pixels:
//! - GPU registries for meshes and textures
//! - Frames in flight, swapchain recreation and the depth buffer
//! - Per-frame uniforms and per-draw push constants

pub mod depth_buffer;
pub mod draw;
pub mod frame;
pub mod renderer;
pub mod ubo;

pub use draw::{DrawItem, FrameScene};
pub use renderer::{MAX_MATERIALS, Renderer};

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
