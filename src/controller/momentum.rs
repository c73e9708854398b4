//! Momentum integration: gravity, friction, air control and slope sliding.
//!
//! Everything here works on world-space vectors. Callers holding momentum in
//! body-local space convert before and after (see [`MomentumFrame`]).

use nalgebra::UnitQuaternion;
use serde::Deserialize;

use super::constants::movement::AIR_CONTROL_DAMPING;
use super::math::{
    clamp_magnitude, extract_dot_vector, move_towards, normalize_or_zero, project,
    project_on_plane, remove_dot_vector, Vec3,
};
use super::state::ControllerState;

/// How horizontal momentum decays toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrictionModel {
    /// `h * exp(-friction * dt)`
    #[default]
    Exponential,
    /// Move toward zero by `friction * dt`
    Linear,
}

impl FrictionModel {
    pub fn apply(self, horizontal: &Vec3, friction: f32, dt: f32) -> Vec3 {
        match self {
            FrictionModel::Exponential => horizontal * (-friction * dt).exp(),
            FrictionModel::Linear => move_towards(horizontal, &Vec3::zeros(), friction * dt),
        }
    }
}

/// Tuning consumed by [`integrate`].
#[derive(Debug, Clone, Copy)]
pub struct MomentumParams {
    pub gravity: f32,
    pub slide_gravity: f32,
    pub walk_speed: f32,
    pub air_control_rate: f32,
    pub air_friction: f32,
    pub ground_friction: f32,
    pub friction_model: FrictionModel,
    pub jump_speed: f32,
}

/// Per-step inputs to [`integrate`].
#[derive(Debug, Clone, Copy)]
pub struct MomentumStep {
    pub state: ControllerState,
    pub up: Vec3,
    /// Input-driven velocity for this step
    pub movement_velocity: Vec3,
    pub ground_normal: Vec3,
    pub dt: f32,
}

/// Advances world-space momentum by one fixed step.
pub fn integrate(momentum: Vec3, step: &MomentumStep, params: &MomentumParams) -> Vec3 {
    let up = step.up;
    let dt = step.dt;

    let mut vertical = extract_dot_vector(&momentum, &up);
    let mut horizontal = momentum - vertical;

    vertical -= up * params.gravity * dt;

    if step.state == ControllerState::Grounded && vertical.dot(&up) < 0.0 {
        vertical = Vec3::zeros();
    }

    if !step.state.is_grounded() {
        let mut movement = step.movement_velocity;
        if horizontal.norm() > params.walk_speed {
            // External momentum: no speed gain along it, damped steering only.
            let dir = normalize_or_zero(&horizontal);
            if movement.dot(&dir) > 0.0 {
                movement = remove_dot_vector(&movement, &dir);
            }
            horizontal += movement * dt * params.air_control_rate * AIR_CONTROL_DAMPING;
        } else {
            horizontal += movement * dt * params.air_control_rate;
            horizontal = clamp_magnitude(&horizontal, params.walk_speed);
        }
    }

    if step.state == ControllerState::Sliding {
        let point_down = normalize_or_zero(&project_on_plane(&step.ground_normal, &up));
        let slope_movement = remove_dot_vector(&step.movement_velocity, &point_down);
        horizontal += slope_movement * dt;
    }

    let friction = if step.state == ControllerState::Grounded {
        params.ground_friction
    } else {
        params.air_friction
    };
    horizontal = params.friction_model.apply(&horizontal, friction, dt);

    let mut momentum = horizontal + vertical;

    if step.state == ControllerState::Sliding {
        momentum = project_on_plane(&momentum, &step.ground_normal);
        if momentum.dot(&up) > 0.0 {
            momentum = remove_dot_vector(&momentum, &up);
        }
        let slide_dir = normalize_or_zero(&project_on_plane(&(-up), &step.ground_normal));
        momentum += slide_dir * params.slide_gravity * dt;
    }

    if step.state == ControllerState::Jumping {
        momentum = remove_dot_vector(&momentum, &up);
        momentum += up * params.jump_speed;
    }

    momentum
}

/// Folds last step's movement velocity into momentum when ground contact is lost,
/// without re-adding speed the momentum already carries in that direction.
pub fn transfer_on_ground_lost(momentum: Vec3, movement_velocity: Vec3) -> Vec3 {
    let mut velocity = movement_velocity;
    if momentum.norm_squared() > 0.0 && velocity.norm_squared() > 0.0 {
        let dir = normalize_or_zero(&velocity);
        let projected = project(&momentum, &dir);
        let dot = normalize_or_zero(&projected).dot(&dir);
        if projected.norm_squared() >= velocity.norm_squared() && dot > 0.0 {
            velocity = Vec3::zeros();
        } else if dot > 0.0 {
            velocity -= projected;
        }
    }
    momentum + velocity
}

/// Strips vertical momentum after hitting a ceiling.
pub fn strip_vertical(momentum: Vec3, up: &Vec3) -> Vec3 {
    remove_dot_vector(&momentum, up)
}

/// True when vertical momentum exceeds `threshold` and points along `up`.
pub fn is_rising(momentum: &Vec3, up: &Vec3, threshold: f32) -> bool {
    let vertical = extract_dot_vector(momentum, up);
    vertical.norm() > threshold && momentum.dot(up) > 0.0
}

/// Frame in which momentum is stored between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentumFrame {
    World,
    /// Relative to the body rotation
    Local,
}

impl MomentumFrame {
    pub fn to_world(self, stored: Vec3, rotation: &UnitQuaternion<f32>) -> Vec3 {
        match self {
            MomentumFrame::World => stored,
            MomentumFrame::Local => rotation * stored,
        }
    }

    pub fn from_world(self, world: Vec3, rotation: &UnitQuaternion<f32>) -> Vec3 {
        match self {
            MomentumFrame::World => world,
            MomentumFrame::Local => rotation.inverse() * world,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.02;

    fn params() -> MomentumParams {
        MomentumParams {
            gravity: 30.0,
            slide_gravity: 5.0,
            walk_speed: 3.0,
            air_control_rate: 2.0,
            air_friction: 0.0,
            ground_friction: 100.0,
            friction_model: FrictionModel::Exponential,
            jump_speed: 10.0,
        }
    }

    fn step(state: ControllerState, movement: Vec3) -> MomentumStep {
        MomentumStep {
            state,
            up: Vec3::y(),
            movement_velocity: movement,
            ground_normal: Vec3::y(),
            dt: DT,
        }
    }

    #[test]
    fn test_airborne_vertical_drops_by_gravity_each_step() {
        let p = params();
        let mut m = Vec3::new(0.0, 2.0, 0.0);
        for _ in 0..10 {
            let before = m.y;
            m = integrate(m, &step(ControllerState::Falling, Vec3::zeros()), &p);
            assert!((before - m.y - p.gravity * DT).abs() < 1e-4);
        }
    }

    #[test]
    fn test_grounded_discards_downward_momentum() {
        let m = integrate(
            Vec3::new(0.0, -4.0, 0.0),
            &step(ControllerState::Grounded, Vec3::zeros()),
            &params(),
        );
        assert_eq!(m.y, 0.0);
    }

    #[test]
    fn test_air_control_clamps_to_walk_speed() {
        let p = params();
        let mut m = Vec3::new(2.9, 0.0, 0.0);
        for _ in 0..50 {
            m = integrate(m, &step(ControllerState::Falling, Vec3::new(3.0, 0.0, 0.0)), &p);
        }
        let horizontal = Vec3::new(m.x, 0.0, m.z);
        assert!(horizontal.norm() <= p.walk_speed + 1e-4);
    }

    #[test]
    fn test_external_momentum_gains_no_speed_from_aligned_input() {
        let p = params();
        let m0 = Vec3::new(8.0, 0.0, 0.0);
        let m1 = integrate(m0, &step(ControllerState::Falling, Vec3::new(3.0, 0.0, 0.0)), &p);
        assert!((m1.x - 8.0).abs() < 1e-5);

        // Perpendicular input still steers, damped.
        let m2 = integrate(m0, &step(ControllerState::Falling, Vec3::new(0.0, 0.0, 3.0)), &p);
        let expected = 3.0 * DT * p.air_control_rate * AIR_CONTROL_DAMPING;
        assert!((m2.z - expected).abs() < 1e-5);
    }

    #[test]
    fn test_ground_friction_decays_horizontal() {
        let mut p = params();
        p.friction_model = FrictionModel::Linear;
        let m = integrate(
            Vec3::new(1.0, 0.0, 0.0),
            &step(ControllerState::Grounded, Vec3::zeros()),
            &p,
        );
        assert_eq!(m, Vec3::zeros());

        p.friction_model = FrictionModel::Exponential;
        let m = integrate(
            Vec3::new(1.0, 0.0, 0.0),
            &step(ControllerState::Grounded, Vec3::zeros()),
            &p,
        );
        assert!((m.x - (-100.0_f32 * DT).exp()).abs() < 1e-5);
    }

    #[test]
    fn test_sliding_pulls_down_slope_and_never_up() {
        let p = params();
        let tilt = 60.0_f32.to_radians();
        let normal = Vec3::new(tilt.sin(), tilt.cos(), 0.0);
        let s = MomentumStep {
            state: ControllerState::Sliding,
            up: Vec3::y(),
            movement_velocity: Vec3::zeros(),
            ground_normal: normal,
            dt: DT,
        };
        let mut m = Vec3::zeros();
        for _ in 0..20 {
            m = integrate(m, &s, &p);
            assert!(m.y <= 1e-6, "sliding momentum should not point up: {:?}", m);
        }
        // Normal leans toward +x, so the slope descends toward +x.
        assert!(m.x > 0.0);
        assert!(m.dot(&normal).abs() < 1e-3);
    }

    #[test]
    fn test_jumping_overrides_vertical_with_jump_speed() {
        let p = params();
        let m = integrate(
            Vec3::new(1.0, 3.0, 0.0),
            &step(ControllerState::Jumping, Vec3::zeros()),
            &p,
        );
        assert!((m.y - p.jump_speed).abs() < 1e-6);
    }

    #[test]
    fn test_ground_lost_transfer_avoids_double_counting() {
        let movement = Vec3::new(3.0, 0.0, 0.0);
        assert_eq!(transfer_on_ground_lost(Vec3::zeros(), movement), movement);

        let fast = Vec3::new(5.0, 0.0, 0.0);
        assert_eq!(transfer_on_ground_lost(fast, movement), fast);

        let slow = Vec3::new(1.0, 0.0, 0.0);
        let m = transfer_on_ground_lost(slow, movement);
        assert!((m.x - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_rising_needs_threshold_and_upward_sign() {
        let up = Vec3::y();
        assert!(is_rising(&Vec3::new(0.0, 0.5, 0.0), &up, 0.001));
        assert!(!is_rising(&Vec3::new(0.0, -0.5, 0.0), &up, 0.001));
        assert!(!is_rising(&Vec3::new(0.0, 0.0005, 0.0), &up, 0.001));
    }

    #[test]
    fn test_local_frame_round_trips() {
        let rot = UnitQuaternion::from_euler_angles(0.0, 1.2, 0.0);
        let world = Vec3::new(1.0, 2.0, 3.0);
        let stored = MomentumFrame::Local.from_world(world, &rot);
        let back = MomentumFrame::Local.to_world(stored, &rot);
        assert!((back - world).norm() < 1e-5);
    }
}
