//! Per-frame input adaptation: key latches and look accumulation.

use nalgebra::{UnitQuaternion, Vector2};
use serde::Deserialize;

use super::constants::body::PITCH_LIMIT_DEG;
use super::math::{normalize_or_zero, project_on_plane, Vec3};

/// Raw signals delivered once per rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawInput {
    /// x = strafe right, y = forward
    pub move_axis: [f32; 2],
    /// x = yaw, y = pitch
    pub look_delta: [f32; 2],
    pub jump: bool,
    pub crouch: bool,
    pub sprint: bool,
}

impl RawInput {
    pub fn move_vector(&self) -> Vector2<f32> {
        Vector2::new(self.move_axis[0], self.move_axis[1])
    }
}

/// Jump key edges plus the debounce lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct JumpLatch {
    pub is_pressed: bool,
    pub was_pressed: bool,
    pub was_let_go: bool,
    /// Set when a jump fires; cleared when the key is released
    pub locked: bool,
}

impl JumpLatch {
    pub fn update(&mut self, pressed: bool) {
        if !self.is_pressed && pressed {
            self.was_pressed = true;
        }
        if self.is_pressed && !pressed {
            self.was_let_go = true;
            self.locked = false;
        }
        self.is_pressed = pressed;
    }

    /// Pressed since the last fixed step and not locked.
    pub fn wants_jump(&self) -> bool {
        self.was_pressed && !self.locked
    }

    /// Edges are consumed once per fixed step.
    pub fn clear_edges(&mut self) {
        self.was_pressed = false;
        self.was_let_go = false;
    }
}

/// Crouch key edges plus the debounce lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrouchLatch {
    pub is_pressed: bool,
    pub was_pressed: bool,
    /// Suppresses crouch handling until the key is released
    pub locked: bool,
}

impl CrouchLatch {
    pub fn update(&mut self, pressed: bool) {
        if !self.is_pressed && pressed {
            self.was_pressed = true;
        }
        if self.is_pressed && !pressed {
            self.locked = false;
        }
        self.is_pressed = pressed;
    }

    /// Ignore the key until it is released (only if currently held).
    pub fn lock_while_held(&mut self) {
        if self.is_pressed {
            self.locked = true;
        }
        self.was_pressed = false;
    }

    pub fn clear_edges(&mut self) {
        self.was_pressed = false;
    }
}

/// Accumulated view yaw/pitch in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LookState {
    pub yaw: f32,
    pub pitch: f32,
}

impl LookState {
    pub fn apply_delta(&mut self, delta: [f32; 2], sensitivity: f32) {
        self.yaw += delta[0] * sensitivity;
        self.pitch = (self.pitch - delta[1] * sensitivity).clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
    }

    /// View rotation about the world Y axis (pitch excluded).
    pub fn yaw_rotation(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(0.0, self.yaw.to_radians(), 0.0)
    }

    /// Horizontal view forward.
    pub fn forward(&self) -> Vec3 {
        self.yaw_rotation() * Vec3::new(0.0, 0.0, 1.0)
    }

    pub fn right(&self) -> Vec3 {
        self.yaw_rotation() * Vec3::new(1.0, 0.0, 0.0)
    }

    /// Horizontal movement direction for a move axis, relative to `up`.
    pub fn movement_direction(&self, move_axis: Vector2<f32>, up: &Vec3) -> Vec3 {
        let right = normalize_or_zero(&project_on_plane(&self.right(), up));
        let forward = normalize_or_zero(&project_on_plane(&self.forward(), up));
        right * move_axis.x + forward * move_axis.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_latch_fires_once_per_press() {
        let mut latch = JumpLatch::default();
        latch.update(true);
        assert!(latch.wants_jump());
        latch.locked = true;
        latch.clear_edges();
        latch.update(true);
        assert!(!latch.wants_jump());
        latch.update(false);
        assert!(latch.was_let_go);
        assert!(!latch.locked);
        latch.clear_edges();
        latch.update(true);
        assert!(latch.wants_jump());
    }

    #[test]
    fn test_crouch_lock_clears_on_release() {
        let mut latch = CrouchLatch::default();
        latch.update(true);
        latch.lock_while_held();
        assert!(latch.locked);
        assert!(!latch.was_pressed);
        latch.update(false);
        assert!(!latch.locked);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut look = LookState::default();
        look.apply_delta([0.0, -10_000.0], 1.0);
        assert_eq!(look.pitch, PITCH_LIMIT_DEG);
        look.apply_delta([0.0, 10_000.0], 1.0);
        assert_eq!(look.pitch, -PITCH_LIMIT_DEG);
    }

    #[test]
    fn test_movement_follows_yaw() {
        let look = LookState::default();
        let dir = look.movement_direction(Vector2::new(0.0, 1.0), &Vec3::y());
        assert!((dir - Vec3::z()).norm() < 1e-6);

        let turned = LookState { yaw: 90.0, pitch: 0.0 };
        let dir = turned.movement_direction(Vector2::new(0.0, 1.0), &Vec3::y());
        assert!((dir - Vec3::x()).norm() < 1e-5, "{:?}", dir);
    }
}
