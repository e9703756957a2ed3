//! Application configuration.
//!
//! Configuration is a single JSON document. Every section and field is
//! optional; anything missing takes the default below, so an empty `{}` file
//! is a valid configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub spaceship: SpaceshipConfig,
    pub interaction: InteractionConfig,
    pub system: SystemConfig,
}

/// Window title and initial size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Close the window when Escape is pressed.
    pub escape_closes: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: String::from("Orrery"),
            width: 1280,
            height: 720,
            escape_closes: true,
        }
    }
}

/// Projection and camera-rig tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Offset along +Z of the overview camera.
    pub start_distance: f32,
    /// Height of the overview camera above the orbital plane; 0 is edge-on.
    pub overview_height: f32,
    /// Initial distance of the orbit camera.
    pub orbit_distance: f32,
    /// Radians of orbit per pixel of mouse drag.
    pub orbit_sensitivity: f32,
    /// Distance change per scroll line.
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Chase camera offset behind and above the ship, in ship space.
    pub chase_offset: [f32; 3],
    /// Rate at which the chase camera catches up with the ship.
    pub follow_smoothing: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 200.0,
            start_distance: 7.0,
            overview_height: 28.0,
            orbit_distance: 30.0,
            orbit_sensitivity: 0.005,
            zoom_speed: 1.0,
            min_distance: 2.0,
            max_distance: 120.0,
            chase_offset: [0.0, 1.5, 5.0],
            follow_smoothing: 6.0,
        }
    }
}

/// Spaceship flight model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceshipConfig {
    /// Units per second at full thrust.
    pub max_speed: f32,
    /// Radians per second at full turn input.
    pub turn_speed: f32,
    /// Velocity smoothing rate; larger values reach the target sooner.
    pub smoothing: f32,
    /// Starting position.
    pub start: [f32; 3],
    pub scale: f32,
    /// Optional glTF model; a procedural hull is used when absent.
    pub model: Option<PathBuf>,
}

impl Default for SpaceshipConfig {
    fn default() -> Self {
        Self {
            max_speed: 8.0,
            turn_speed: 1.8,
            smoothing: 3.0,
            start: [0.0, 1.0, 14.0],
            scale: 0.3,
            model: None,
        }
    }
}

/// Hover highlight and click boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Tint applied to the planet under the cursor.
    pub highlight_color: [f32; 3],
    /// Spin multiplier applied on click.
    pub boost_factor: f32,
    /// How long a click boost lasts.
    pub boost_seconds: f32,
    /// Cursor travel in pixels beyond which a press is a drag, not a click.
    pub click_slop: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            highlight_color: [1.0, 0.85, 0.2],
            boost_factor: 2.0,
            boost_seconds: 2.0,
            click_slop: 4.0,
        }
    }
}

/// Solar system source and presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// JSON planet table; the built-in system is used when absent.
    pub descriptor: Option<PathBuf>,
    /// Directory texture paths are resolved against.
    pub asset_root: PathBuf,
    /// Draw a ring along each orbit.
    pub show_orbits: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            descriptor: None,
            asset_root: PathBuf::from("assets"),
            show_orbits: true,
        }
    }
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Like [`Config::load`], falling back to defaults on any failure.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No configuration at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring configuration {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the camera, ship or interaction code cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::Config(msg.to_string()));

        if self.window.width == 0 || self.window.height == 0 {
            return invalid("window size must be non-zero");
        }

        let cam = &self.camera;
        if !(cam.fov_y_degrees > 0.0 && cam.fov_y_degrees < 180.0) {
            return invalid("camera.fov_y_degrees must be in (0, 180)");
        }
        if !(cam.near > 0.0 && cam.near < cam.far) {
            return invalid("camera.near must be positive and less than camera.far");
        }
        if !(cam.start_distance.is_finite() && cam.overview_height.is_finite())
            || cam.start_distance.hypot(cam.overview_height) <= cam.near
        {
            return invalid("camera overview position must lie beyond the near plane");
        }
        if cam.min_distance <= 0.0 || cam.min_distance > cam.max_distance {
            return invalid("camera distance limits are inconsistent");
        }
        if !(cam.min_distance..=cam.max_distance).contains(&cam.orbit_distance) {
            return invalid("camera.orbit_distance must lie within the distance limits");
        }

        let ship = &self.spaceship;
        if ship.max_speed <= 0.0 || ship.smoothing <= 0.0 || ship.scale <= 0.0 {
            return invalid("spaceship speed, smoothing and scale must be positive");
        }

        let inter = &self.interaction;
        if inter.boost_factor <= 0.0 {
            return invalid("interaction.boost_factor must be positive");
        }
        if inter.boost_seconds <= 0.0 {
            return invalid("interaction.boost_seconds must be positive");
        }

        Ok(())
    }
}
