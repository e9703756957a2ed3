//! Errors raised by the Vulkan layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// The Vulkan loader library could not be found or opened
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// The allocator mutex was poisoned by a panic on another thread
    #[error("GPU allocator lock poisoned")]
    AllocatorPoisoned,

    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A device was selected without a queue family it needs
    #[error("Missing queue family: {0}")]
    MissingQueueFamily(&'static str),

    #[error("Shader error: {0}")]
    ShaderError(String),

    #[error("Surface error: {0}")]
    SurfaceError(String),

    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Texture data that cannot become an image, e.g. zero-sized
    #[error("Texture error: {0}")]
    TextureError(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;

impl<T> From<std::sync::PoisonError<T>> for RhiError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        RhiError::AllocatorPoisoned
    }
}
