//! Camera modes and the rig that places the camera each frame.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Vec2, Vec3};
use tracing::info;

use orrery_core::CameraConfig;

use crate::camera::{Camera, overview_position};
use crate::spaceship::{ShipPose, smoothing_factor};

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraMode {
    /// Fixed view of the sun from the start distance.
    Overview,
    /// Mouse-driven orbit around the sun.
    Orbit,
    /// Trailing behind the spaceship.
    Chase,
    /// Sitting in the spaceship, looking along its heading.
    Cockpit,
}

impl CameraMode {
    pub const ALL: [CameraMode; 4] = [
        CameraMode::Overview,
        CameraMode::Orbit,
        CameraMode::Chase,
        CameraMode::Cockpit,
    ];

    /// The following mode, wrapping after the last.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            CameraMode::Overview => "overview",
            CameraMode::Orbit => "orbit",
            CameraMode::Chase => "chase",
            CameraMode::Cockpit => "cockpit",
        }
    }

    /// Whether the mode follows the spaceship.
    pub fn follows_ship(self) -> bool {
        matches!(self, CameraMode::Chase | CameraMode::Cockpit)
    }
}

/// Mouse input consumed by the orbit mode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RigInput {
    /// Cursor travel in pixels while dragging.
    pub drag: Vec2,
    /// Scroll lines; positive zooms in.
    pub zoom: f32,
}

#[derive(Debug, Clone)]
pub struct CameraRig {
    mode: CameraMode,
    yaw: f32,
    pitch: f32,
    distance: f32,
    config: CameraConfig,
}

impl CameraRig {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            mode: CameraMode::Overview,
            yaw: 0.0,
            pitch: 0.35,
            distance: config.orbit_distance,
            config: config.clone(),
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode != self.mode {
            info!("Camera mode: {} -> {}", self.mode.label(), mode.label());
            self.mode = mode;
        }
    }

    pub fn cycle(&mut self) {
        self.set_mode(self.mode.next());
    }

    pub fn orbit_distance(&self) -> f32 {
        self.distance
    }

    pub fn orbit_angles(&self) -> (f32, f32) {
        (self.yaw, self.pitch)
    }

    /// Position on the orbit sphere for the current yaw, pitch and distance.
    fn orbit_position(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(cp * sy, sp, cp * cy) * self.distance
    }

    /// Place `camera` for the current mode.
    pub fn update(&mut self, camera: &mut Camera, input: RigInput, ship: &ShipPose, dt: f32) {
        match self.mode {
            CameraMode::Overview => {
                camera.position = overview_position(&self.config);
                camera.look_at(Vec3::ZERO);
            }
            CameraMode::Orbit => {
                let sens = self.config.orbit_sensitivity;
                self.yaw = (self.yaw - input.drag.x * sens).rem_euclid(TAU);
                self.pitch = (self.pitch + input.drag.y * sens).clamp(-PITCH_LIMIT, PITCH_LIMIT);
                self.distance = (self.distance - input.zoom * self.config.zoom_speed)
                    .clamp(self.config.min_distance, self.config.max_distance);

                camera.position = self.orbit_position();
                camera.look_at(Vec3::ZERO);
            }
            CameraMode::Chase => {
                let offset = ship.rotation * Vec3::from(self.config.chase_offset);
                let target = ship.position + offset;
                let t = smoothing_factor(self.config.follow_smoothing, dt);
                camera.position = camera.position.lerp(target, t);
                camera.look_at(ship.position + ship.forward() * 2.0);
            }
            CameraMode::Cockpit => {
                camera.position = ship.position + ship.rotation * Vec3::new(0.0, 0.15, -0.2);
                camera.rotation = ship.rotation;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn ship_at(position: Vec3) -> ShipPose {
        ShipPose {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    #[test]
    fn test_next_cycles_all_modes() {
        let mut mode = CameraMode::Overview;
        let mut seen = Vec::new();
        for _ in 0..CameraMode::ALL.len() {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(mode, CameraMode::Overview);
        assert_eq!(seen, CameraMode::ALL.to_vec());
    }

    #[test]
    fn test_overview_matches_initial_view() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);
        let start = Camera::from_config(&config, 1.0);
        let mut cam = start.clone();
        cam.position = Vec3::new(50.0, 3.0, 1.0);

        rig.update(&mut cam, RigInput::default(), &ship_at(Vec3::ZERO), 0.016);
        assert_eq!(cam.position, Vec3::new(0.0, 28.0, 7.0));
        assert!((cam.forward() - start.forward()).length() < 1e-5);
    }

    #[test]
    fn test_overview_looks_down_on_whole_system() {
        let config = CameraConfig::default();
        let cam = Camera::from_config(&config, 16.0 / 9.0);
        assert!(cam.forward().y < -0.9);

        // Points on the outermost orbit land inside the frame.
        let outer = 16.2;
        for angle in (0..8).map(|i| i as f32 * TAU / 8.0) {
            let point = Vec3::new(angle.cos(), 0.0, angle.sin()) * outer;
            let clip = cam.view_projection_matrix() * point.extend(1.0);
            assert!(clip.w > 0.0, "orbit point {point} is behind the camera");
            let ndc = clip.truncate() / clip.w;
            assert!(ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0, "{point} off screen");
        }
    }

    #[test]
    fn test_edge_on_overview() {
        let config = CameraConfig {
            overview_height: 0.0,
            ..CameraConfig::default()
        };
        let mut rig = CameraRig::new(&config);
        let mut cam = Camera::from_config(&config, 1.0);
        rig.update(&mut cam, RigInput::default(), &ship_at(Vec3::ZERO), 0.016);
        assert_eq!(cam.position, Vec3::new(0.0, 0.0, 7.0));
        assert!((cam.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_orbit_drag_and_zoom() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);
        rig.set_mode(CameraMode::Orbit);
        let mut cam = Camera::new();

        rig.update(&mut cam, RigInput::default(), &ship_at(Vec3::ZERO), 0.016);
        assert!((cam.position.length() - config.orbit_distance).abs() < 1e-3);
        let start = cam.position;

        let input = RigInput {
            drag: Vec2::new(100.0, 0.0),
            zoom: 3.0,
        };
        rig.update(&mut cam, input, &ship_at(Vec3::ZERO), 0.016);
        assert!((rig.orbit_distance() - (config.orbit_distance - 3.0)).abs() < 1e-4);
        assert!((cam.position.length() - rig.orbit_distance()).abs() < 1e-3);
        let expected_y = start.y * rig.orbit_distance() / config.orbit_distance;
        assert!((cam.position.y - expected_y).abs() < 1e-3);
        assert!(cam.forward().dot(-cam.position.normalize()) > 0.9999);
    }

    #[test]
    fn test_orbit_pitch_and_distance_clamped() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);
        rig.set_mode(CameraMode::Orbit);
        let mut cam = Camera::new();

        let input = RigInput {
            drag: Vec2::new(0.0, 1e6),
            zoom: 1e6,
        };
        rig.update(&mut cam, input, &ship_at(Vec3::ZERO), 0.016);
        let (_, pitch) = rig.orbit_angles();
        assert!(pitch <= PITCH_LIMIT);
        assert_eq!(rig.orbit_distance(), config.min_distance);
        assert!(cam.position.is_finite());

        let input = RigInput {
            drag: Vec2::ZERO,
            zoom: -1e6,
        };
        rig.update(&mut cam, input, &ship_at(Vec3::ZERO), 0.016);
        assert_eq!(rig.orbit_distance(), config.max_distance);
    }

    #[test]
    fn test_chase_converges_behind_ship() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);
        rig.set_mode(CameraMode::Chase);
        let mut cam = Camera::new();
        let ship = ship_at(Vec3::new(10.0, 0.0, 0.0));

        rig.update(&mut cam, RigInput::default(), &ship, 1.0 / 60.0);
        let first = cam.position;
        let target = ship.position + Vec3::from(config.chase_offset);
        assert!(first.distance(target) > 0.1, "smoothed, not snapped");

        for _ in 0..600 {
            rig.update(&mut cam, RigInput::default(), &ship, 1.0 / 60.0);
        }
        assert!(cam.position.distance(target) < 1e-3);
        assert!(cam.forward().z < 0.0, "looks ahead of the ship");
    }

    #[test]
    fn test_cockpit_uses_ship_heading() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);
        rig.set_mode(CameraMode::Cockpit);
        let mut cam = Camera::new();
        let ship = ShipPose {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(FRAC_PI_2),
        };

        rig.update(&mut cam, RigInput::default(), &ship, 0.016);
        assert!((cam.forward() - Vec3::NEG_X).length() < 1e-5);
        assert!(cam.position.distance(ship.position) < 0.5);
    }

    #[test]
    fn test_follows_ship() {
        assert!(!CameraMode::Overview.follows_ship());
        assert!(!CameraMode::Orbit.follows_ship());
        assert!(CameraMode::Chase.follows_ship());
        assert!(CameraMode::Cockpit.follows_ship());
    }
}
