//! Key bindings.
//!
//! | keys | action |
//! |------|--------|
//! | W / S, Up / Down | thrust forward / back |
//! | A / D, Left / Right | turn left / right |
//! | Q / E | strafe left / right |
//! | Space / Shift | rise / sink |
//! | C | next camera mode |
//! | 1 to 4 | overview, orbit, chase, cockpit |
//! | O | toggle orbit rings |
//! | Escape | quit |

use orrery_platform::{InputState, KeyCode};
use orrery_scene::{CameraMode, ShipInput};

const MODE_KEYS: [KeyCode; 4] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
];

pub fn ship_input(input: &InputState) -> ShipInput {
    ShipInput {
        thrust: input.axis(
            &[KeyCode::KeyS, KeyCode::ArrowDown],
            &[KeyCode::KeyW, KeyCode::ArrowUp],
        ),
        // Positive yaw turns the nose toward -X, i.e. left.
        turn: input.axis(
            &[KeyCode::KeyD, KeyCode::ArrowRight],
            &[KeyCode::KeyA, KeyCode::ArrowLeft],
        ),
        strafe: input.axis(&[KeyCode::KeyQ], &[KeyCode::KeyE]),
        lift: input.axis(
            &[KeyCode::ShiftLeft, KeyCode::ShiftRight],
            &[KeyCode::Space],
        ),
    }
}

/// Camera mode change asked for this frame, given the current mode.
pub fn requested_mode(input: &InputState, current: CameraMode) -> Option<CameraMode> {
    if let Some(i) = MODE_KEYS.iter().position(|&k| input.is_key_just_pressed(k)) {
        return Some(CameraMode::ALL[i]);
    }
    input
        .is_key_just_pressed(KeyCode::KeyC)
        .then(|| current.next())
}

pub fn toggle_orbits(input: &InputState) -> bool {
    input.is_key_just_pressed(KeyCode::KeyO)
}

pub fn quit_requested(input: &InputState) -> bool {
    input.is_key_just_pressed(KeyCode::Escape)
}
