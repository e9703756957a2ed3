//! Error types for the visualizer.

use thiserror::Error;

/// Main error type shared across the workspace.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Asset loading errors (textures, models, planet tables)
    #[error("Resource error: {0}")]
    Resource(String),

    /// Shader loading errors
    #[error("Shader error: {0}")]
    Shader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the workspace's Error type.
pub type Result<T> = std::result::Result<T, Error>;
