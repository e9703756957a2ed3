//! Keyboard-flown spaceship.
//!
//! Input sets a target velocity; the actual velocity chases it by linear
//! interpolation each frame, so the ship accelerates and coasts to a stop
//! instead of snapping.

use std::f32::consts::TAU;

use glam::{Quat, Vec3};

use orrery_core::SpaceshipConfig;

use crate::transform::Transform;

/// Per-frame control axes, each in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShipInput {
    /// Forward (+) / backward (-).
    pub thrust: f32,
    /// Right (+) / left (-) sideways slide.
    pub strafe: f32,
    /// Up (+) / down (-).
    pub lift: f32,
    /// Turn left (+) / right (-) about the world Y axis.
    pub turn: f32,
}

impl ShipInput {
    fn clamped(self) -> Self {
        let c = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            thrust: c(self.thrust),
            strafe: c(self.strafe),
            lift: c(self.lift),
            turn: c(self.turn),
        }
    }
}

/// Interpolation factor for exponential smoothing at `rate` over `dt`.
///
/// `a.lerp(b, smoothing_factor(rate, dt))` moves the same fraction of the way
/// per second regardless of frame rate.
pub fn smoothing_factor(rate: f32, dt: f32) -> f32 {
    if rate <= 0.0 || dt <= 0.0 {
        return 0.0;
    }
    (1.0 - (-rate * dt).exp()).clamp(0.0, 1.0)
}

/// Position and orientation handed to the camera rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl ShipPose {
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

#[derive(Debug, Clone)]
pub struct Spaceship {
    position: Vec3,
    velocity: Vec3,
    yaw: f32,
    max_speed: f32,
    turn_speed: f32,
    smoothing: f32,
    scale: f32,
}

impl Spaceship {
    pub fn new(config: &SpaceshipConfig) -> Self {
        Self {
            position: Vec3::from(config.start),
            velocity: Vec3::ZERO,
            yaw: 0.0,
            max_speed: config.max_speed,
            turn_speed: config.turn_speed,
            smoothing: config.smoothing,
            scale: config.scale,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    pub fn pose(&self) -> ShipPose {
        ShipPose {
            position: self.position,
            rotation: self.rotation(),
        }
    }

    /// Velocity the ship would settle at if `input` were held.
    pub fn target_velocity(&self, input: ShipInput) -> Vec3 {
        let input = input.clamped();
        let local = Vec3::new(input.strafe, input.lift, -input.thrust);
        // Diagonal input must not exceed full speed.
        let local = local.clamp_length_max(1.0);
        self.rotation() * local * self.max_speed
    }

    /// Turn, smooth the velocity toward the input target, then move.
    pub fn update(&mut self, input: ShipInput, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let input = input.clamped();
        self.yaw = (self.yaw + input.turn * self.turn_speed * dt).rem_euclid(TAU);

        let target = self.target_velocity(input);
        self.velocity = self
            .velocity
            .lerp(target, smoothing_factor(self.smoothing, dt));
        self.position += self.velocity * dt;
    }

    /// Local transform for the ship's scene node.
    pub fn transform(&self) -> Transform {
        Transform::new()
            .with_position(self.position)
            .with_rotation(self.rotation())
            .with_uniform_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ship() -> Spaceship {
        Spaceship::new(&SpaceshipConfig {
            start: [0.0, 0.0, 0.0],
            ..SpaceshipConfig::default()
        })
    }

    const FORWARD: ShipInput = ShipInput {
        thrust: 1.0,
        strafe: 0.0,
        lift: 0.0,
        turn: 0.0,
    };

    #[test]
    fn test_smoothing_factor_bounds() {
        assert_eq!(smoothing_factor(3.0, 0.0), 0.0);
        assert_eq!(smoothing_factor(0.0, 1.0), 0.0);
        let a = smoothing_factor(3.0, 1.0 / 60.0);
        assert!(a > 0.0 && a < 1.0);
        assert!(smoothing_factor(1e6, 1.0) <= 1.0);
    }

    #[test]
    fn test_smoothing_is_frame_rate_independent() {
        // Two half-steps leave the same residual as one full step.
        let one = 1.0 - smoothing_factor(3.0, 0.1);
        let half = 1.0 - smoothing_factor(3.0, 0.05);
        assert!((one - half * half).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_converges_without_overshoot() {
        let mut ship = ship();
        let target = ship.target_velocity(FORWARD);
        assert!((target.length() - ship.max_speed).abs() < 1e-5);

        let mut last_speed = 0.0;
        for _ in 0..600 {
            ship.update(FORWARD, 1.0 / 60.0);
            let speed = ship.speed();
            assert!(speed >= last_speed - 1e-6, "speed must not drop");
            assert!(speed <= ship.max_speed + 1e-4, "no overshoot");
            last_speed = speed;
        }
        assert!((ship.velocity() - target).length() < 1e-2);
        assert!(ship.position().z < 0.0, "forward is -Z");
    }

    #[test]
    fn test_coasts_to_stop() {
        let mut ship = ship();
        for _ in 0..120 {
            ship.update(FORWARD, 1.0 / 60.0);
        }
        let cruising = ship.speed();
        ship.update(ShipInput::default(), 1.0 / 60.0);
        let coasting = ship.speed();
        assert!(coasting < cruising && coasting > 0.0);

        for _ in 0..1200 {
            ship.update(ShipInput::default(), 1.0 / 60.0);
        }
        assert!(ship.speed() < 1e-3);
    }

    #[test]
    fn test_diagonal_input_capped() {
        let ship = ship();
        let v = ship.target_velocity(ShipInput {
            thrust: 1.0,
            strafe: 1.0,
            lift: 1.0,
            turn: 0.0,
        });
        assert!(v.length() <= ship.max_speed + 1e-5);
    }

    #[test]
    fn test_out_of_range_input_clamped() {
        let ship = ship();
        let v = ship.target_velocity(ShipInput {
            thrust: 50.0,
            strafe: f32::NAN,
            ..ShipInput::default()
        });
        assert!(v.is_finite());
        assert!((v.length() - ship.max_speed).abs() < 1e-4);
    }

    #[test]
    fn test_turning_rotates_heading() {
        let mut ship = ship();
        let turn_left = ShipInput {
            turn: 1.0,
            ..ShipInput::default()
        };
        let seconds = std::f32::consts::FRAC_PI_2 / ship.turn_speed;
        ship.update(turn_left, seconds);
        // A quarter turn left from -Z faces -X.
        assert!((ship.forward() - Vec3::NEG_X).length() < 1e-4);
        assert!((ship.target_velocity(FORWARD).normalize() - Vec3::NEG_X).length() < 1e-4);
    }

    #[test]
    fn test_transform_matches_pose() {
        let mut ship = ship();
        ship.update(FORWARD, 0.5);
        let t = ship.transform();
        assert_eq!(t.position, ship.position());
        assert_eq!(t.rotation, ship.rotation());
        assert_eq!(t.scale, Vec3::splat(0.3));
    }
}
