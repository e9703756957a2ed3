//! Core utilities shared by every orrery crate.
//!
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Application configuration loaded from JSON

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    CameraConfig, Config, InteractionConfig, SpaceshipConfig, SystemConfig, WindowConfig,
};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::{MAX_FRAME_DELTA, Timer};
