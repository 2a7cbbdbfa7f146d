//! Keyboard and mouse-look state gathered between frames

use common::CameraState;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

use crate::animation::InputSnapshot;

/// Radians of turn per pixel of mouse motion.
pub const MOUSE_SENSITIVITY: f32 = 0.002;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputState {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    pointer_locked: bool,
    mouse_delta: (f64, f64),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key transition. Returns whether the key is a movement key.
    pub fn handle_key(&mut self, key: KeyCode, state: ElementState) -> bool {
        let pressed = state == ElementState::Pressed;
        match key {
            KeyCode::KeyW | KeyCode::ArrowUp => self.forward = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.back = pressed,
            KeyCode::KeyA | KeyCode::ArrowLeft => self.left = pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.right = pressed,
            _ => return false,
        }
        true
    }

    /// Raw motion only counts while the pointer is locked.
    pub fn handle_mouse_motion(&mut self, dx: f64, dy: f64) {
        if self.pointer_locked {
            self.mouse_delta.0 += dx;
            self.mouse_delta.1 += dy;
        }
    }

    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.pointer_locked = locked;
        if !locked {
            self.mouse_delta = (0.0, 0.0);
            // Keys held when focus leaves never see their release.
            self.forward = false;
            self.back = false;
            self.left = false;
            self.right = false;
        }
    }

    pub fn pointer_locked(&self) -> bool {
        self.pointer_locked
    }

    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            forward: axis(self.forward, self.back),
            strafe: axis(self.right, self.left),
            movement_enabled: self.pointer_locked,
        }
    }

    /// Turn the camera by the motion gathered since the last call.
    ///
    /// Moving the mouse right turns right; moving it up looks up.
    pub fn apply_look(&mut self, camera: &mut CameraState) {
        let (dx, dy) = std::mem::take(&mut self.mouse_delta);
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        camera.look(-dx as f32 * MOUSE_SENSITIVITY, -dy as f32 * MOUSE_SENSITIVITY);
    }
}

fn axis(positive: bool, negative: bool) -> i8 {
    positive as i8 - negative as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PITCH_LIMIT;
    use glam::Vec3;

    #[test]
    fn opposite_keys_cancel() {
        let mut input = InputState::new();
        input.set_pointer_locked(true);
        input.handle_key(KeyCode::KeyW, ElementState::Pressed);
        input.handle_key(KeyCode::KeyD, ElementState::Pressed);
        assert_eq!(
            input.snapshot(),
            InputSnapshot {
                forward: 1,
                strafe: 1,
                movement_enabled: true
            }
        );

        input.handle_key(KeyCode::ArrowDown, ElementState::Pressed);
        input.handle_key(KeyCode::ArrowLeft, ElementState::Pressed);
        assert_eq!((input.snapshot().forward, input.snapshot().strafe), (0, 0));

        input.handle_key(KeyCode::KeyW, ElementState::Released);
        assert_eq!(input.snapshot().forward, -1);
        assert!(!input.handle_key(KeyCode::Space, ElementState::Pressed));
    }

    #[test]
    fn unlock_clears_state() {
        let mut input = InputState::new();
        input.set_pointer_locked(true);
        input.handle_key(KeyCode::KeyA, ElementState::Pressed);
        input.handle_mouse_motion(10.0, 0.0);
        input.set_pointer_locked(false);
        assert_eq!(input, InputState::new());
        assert!(!input.snapshot().movement_enabled);
    }

    #[test]
    fn look_only_while_locked() {
        let mut camera = CameraState::new(Vec3::ZERO, 0.0, 0.0);
        let mut input = InputState::new();
        input.handle_mouse_motion(100.0, 0.0);
        input.apply_look(&mut camera);
        assert_eq!(camera.yaw, 0.0);

        input.set_pointer_locked(true);
        input.handle_mouse_motion(50.0, 25.0);
        input.handle_mouse_motion(50.0, 25.0);
        input.apply_look(&mut camera);
        assert!((camera.yaw + 0.2).abs() < 1e-6);
        assert!((camera.pitch + 0.1).abs() < 1e-6);

        // Deltas are consumed.
        input.apply_look(&mut camera);
        assert!((camera.yaw + 0.2).abs() < 1e-6);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = CameraState::new(Vec3::ZERO, 0.0, 0.0);
        let mut input = InputState::new();
        input.set_pointer_locked(true);
        input.handle_mouse_motion(0.0, -10_000.0);
        input.apply_look(&mut camera);
        assert_eq!(camera.pitch, PITCH_LIMIT);
    }
}
