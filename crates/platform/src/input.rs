//! Keyboard and mouse state fed by window events.
//!
//! Events arrive one at a time between frames; the state here accumulates
//! them so the per-frame update can query "is W held", "was C pressed this
//! frame", "how far did the cursor move" without caring about event order.

use std::collections::HashSet;

use glam::Vec2;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    just_released_keys: HashSet<KeyCode>,

    pressed_buttons: HashSet<MouseButton>,
    just_released_buttons: HashSet<MouseButton>,

    /// Cursor position in physical pixels, `None` until the first move event.
    cursor: Option<Vec2>,
    cursor_inside: bool,
    /// Cursor travel accumulated over the current frame.
    cursor_delta: Vec2,
    /// Scroll lines accumulated over the current frame.
    scroll_delta: Vec2,
    /// A left press is in progress or was released this frame.
    left_pressed: bool,
    /// Where the left button went down, for click/drag discrimination.
    press_origin: Option<Vec2>,
    /// Largest distance from `press_origin` seen while the left button was held.
    press_travel: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame state. Call once after the frame has consumed input.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.just_released_buttons.clear();
        self.cursor_delta = Vec2::ZERO;
        self.scroll_delta = Vec2::ZERO;
        if !self.pressed_buttons.contains(&MouseButton::Left) {
            self.reset_press();
        }
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        if self.pressed_buttons.insert(button) && button == MouseButton::Left {
            self.left_pressed = true;
            self.press_origin = self.cursor;
            self.press_travel = 0.0;
        }
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        if self.pressed_buttons.remove(&button) {
            self.just_released_buttons.insert(button);
        }
    }

    /// Cursor moved to `(x, y)` in physical pixels.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        let pos = Vec2::new(x, y);
        if let Some(old) = self.cursor {
            self.cursor_delta += pos - old;
        }
        self.cursor = Some(pos);
        self.cursor_inside = true;

        if let Some(origin) = self.press_origin {
            self.press_travel = self.press_travel.max(origin.distance(pos));
        }
    }

    pub fn on_cursor_entered(&mut self) {
        self.cursor_inside = true;
    }

    /// The cursor left the window; hovering stops until it comes back.
    pub fn on_cursor_left(&mut self) {
        self.cursor_inside = false;
    }

    /// Scroll by `(x, y)` lines.
    pub fn on_scroll(&mut self, delta_x: f32, delta_y: f32) {
        self.scroll_delta += Vec2::new(delta_x, delta_y);
    }

    /// Drop held keys and buttons, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.just_released_keys.extend(self.pressed_keys.drain());
        self.just_released_buttons
            .extend(self.pressed_buttons.drain());
        // A release the user never made is not a click.
        self.reset_press();
    }

    fn reset_press(&mut self) {
        self.left_pressed = false;
        self.press_origin = None;
        self.press_travel = 0.0;
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    /// Signed axis from two sets of keys: `+1` when only a positive key is
    /// held, `-1` when only a negative key is held, `0` otherwise.
    pub fn axis(&self, negative: &[KeyCode], positive: &[KeyCode]) -> f32 {
        let neg = negative.iter().any(|k| self.is_key_pressed(*k));
        let pos = positive.iter().any(|k| self.is_key_pressed(*k));
        match (neg, pos) {
            (false, true) => 1.0,
            (true, false) => -1.0,
            _ => 0.0,
        }
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn is_mouse_just_released(&self, button: MouseButton) -> bool {
        self.just_released_buttons.contains(&button)
    }

    /// A left-button release this frame whose press never travelled more
    /// than `slop` pixels. Drags used to orbit the camera are not clicks.
    pub fn is_click(&self, slop: f32) -> bool {
        self.left_pressed
            && self.is_mouse_just_released(MouseButton::Left)
            && self.press_travel <= slop
    }

    /// Cursor position if it is currently over the window.
    pub fn cursor_position(&self) -> Option<Vec2> {
        if self.cursor_inside { self.cursor } else { None }
    }

    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor_delta
    }

    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_edges() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_just_pressed(KeyCode::KeyW));

        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));

        // Key repeat must not re-trigger the edge.
        input.on_key_pressed(KeyCode::KeyW);
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));

        input.on_key_released(KeyCode::KeyW);
        assert!(!input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_just_released(KeyCode::KeyW));
    }

    #[test]
    fn test_axis() {
        let mut input = InputState::new();
        let neg = [KeyCode::KeyS, KeyCode::ArrowDown];
        let pos = [KeyCode::KeyW, KeyCode::ArrowUp];
        assert_eq!(input.axis(&neg, &pos), 0.0);

        input.on_key_pressed(KeyCode::ArrowUp);
        assert_eq!(input.axis(&neg, &pos), 1.0);

        input.on_key_pressed(KeyCode::KeyS);
        assert_eq!(input.axis(&neg, &pos), 0.0);

        input.on_key_released(KeyCode::ArrowUp);
        assert_eq!(input.axis(&neg, &pos), -1.0);
    }

    #[test]
    fn test_cursor_delta_accumulates() {
        let mut input = InputState::new();
        input.on_mouse_moved(10.0, 10.0);
        assert_eq!(input.cursor_delta(), Vec2::ZERO);

        input.on_mouse_moved(15.0, 12.0);
        input.on_mouse_moved(20.0, 8.0);
        assert_eq!(input.cursor_delta(), Vec2::new(10.0, -2.0));

        input.begin_frame();
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        assert_eq!(input.cursor_position(), Some(Vec2::new(20.0, 8.0)));
    }

    #[test]
    fn test_cursor_left_hides_position() {
        let mut input = InputState::new();
        assert_eq!(input.cursor_position(), None);

        input.on_mouse_moved(3.0, 4.0);
        input.on_cursor_left();
        assert_eq!(input.cursor_position(), None);

        input.on_cursor_entered();
        assert_eq!(input.cursor_position(), Some(Vec2::new(3.0, 4.0)));
    }

    #[test]
    fn test_click_vs_drag() {
        let mut input = InputState::new();
        input.on_mouse_moved(100.0, 100.0);
        input.on_mouse_pressed(MouseButton::Left);
        input.on_mouse_moved(101.0, 100.0);
        input.on_mouse_released(MouseButton::Left);
        assert!(input.is_click(4.0));

        input.begin_frame();
        input.on_mouse_pressed(MouseButton::Left);
        input.begin_frame();
        input.on_mouse_moved(150.0, 100.0);
        input.on_mouse_moved(101.0, 100.0);
        input.on_mouse_released(MouseButton::Left);
        assert!(!input.is_click(4.0), "travel during the drag counts");
    }

    #[test]
    fn test_release_all() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Space);
        input.on_mouse_pressed(MouseButton::Right);
        input.release_all();
        assert!(!input.is_key_pressed(KeyCode::Space));
        assert!(!input.is_mouse_pressed(MouseButton::Right));
        assert!(input.is_key_just_released(KeyCode::Space));
    }

    #[test]
    fn test_focus_loss_is_not_a_click() {
        let mut input = InputState::new();
        input.on_mouse_moved(100.0, 100.0);
        input.on_mouse_pressed(MouseButton::Left);
        input.begin_frame();

        input.release_all();
        assert!(input.is_mouse_just_released(MouseButton::Left));
        assert!(!input.is_click(4.0));

        // The next real click still registers.
        input.begin_frame();
        input.on_mouse_pressed(MouseButton::Left);
        input.on_mouse_released(MouseButton::Left);
        assert!(input.is_click(4.0));
    }

    #[test]
    fn test_release_without_press_is_not_a_click() {
        let mut input = InputState::new();
        input.on_mouse_moved(10.0, 10.0);
        input.on_mouse_pressed(MouseButton::Right);
        input.on_mouse_released(MouseButton::Right);
        assert!(!input.is_click(4.0));
    }
}
