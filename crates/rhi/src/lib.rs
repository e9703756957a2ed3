//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin owning wrappers over `ash` handles for a Vulkan 1.3 device:
//! - Instance, physical device selection and logical device creation
//! - Swapchain management
//! - Command buffer recording with synchronization2 barriers
//! - Buffers, images and textures backed by `gpu-allocator`
//! - Descriptor sets and graphics pipelines for dynamic rendering
//!
//! Every wrapper holds an `Arc<Device>` and destroys its handle on drop.

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
