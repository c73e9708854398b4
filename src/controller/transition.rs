//! Timed crouch and mantle transitions.
//!
//! Each transition owns its elapsed time and is advanced once per rendered
//! frame. Cancelling one is dropping it; nothing is applied after that.

use nalgebra::UnitQuaternion;

use super::backend::{BodyActuator, ViewRig};
use super::math::{ease_in_out, lerp, lerp_vec, Vec3};

/// Seconds a height change takes, proportional to the height delta.
/// A non-positive standing/crouched span makes the change instant.
pub fn crouch_duration(
    crouch_trans_time: f32,
    start_height: f32,
    target_height: f32,
    standing_height: f32,
    crouched_height: f32,
) -> f32 {
    let span = standing_height - crouched_height;
    if span <= 0.0 {
        return 0.0;
    }
    crouch_trans_time * (start_height - target_height).abs() / span
}

/// Eased interpolation of collider and camera heights.
#[derive(Debug, Clone, PartialEq)]
pub struct CrouchTransition {
    start_collider: f32,
    target_collider: f32,
    start_cam: f32,
    target_cam: f32,
    duration: f32,
    elapsed: f32,
}

impl CrouchTransition {
    pub fn new(
        start_collider: f32,
        target_collider: f32,
        start_cam: f32,
        target_cam: f32,
        duration: f32,
    ) -> Self {
        Self {
            start_collider,
            target_collider,
            start_cam,
            target_cam,
            duration: duration.max(0.0),
            elapsed: 0.0,
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn target_collider_height(&self) -> f32 {
        self.target_collider
    }

    /// Heights at the current progress.
    pub fn sample(&self) -> (f32, f32) {
        if self.is_finished() {
            return (self.target_collider, self.target_cam);
        }
        let t = ease_in_out(self.elapsed / self.duration);
        (
            lerp(self.start_collider, self.target_collider, t),
            lerp(self.start_cam, self.target_cam, t),
        )
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Writes the current heights to the body and camera.
    pub fn apply(&self, body: &mut impl BodyActuator, view: &mut impl ViewRig) {
        let (collider, cam) = self.sample();
        body.set_collider_height(collider);
        view.set_local_height(cam);
    }

    /// Advances by one frame and applies; returns true once the targets are reached.
    pub fn advance(
        &mut self,
        dt: f32,
        body: &mut impl BodyActuator,
        view: &mut impl ViewRig,
    ) -> bool {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.apply(body, view);
        self.is_finished()
    }
}

/// Camera-only settle after the body has been snapped onto a ledge.
#[derive(Debug, Clone, PartialEq)]
pub struct MantleTransition {
    start_cam_local: Vec3,
    target_cam_local: Vec3,
    duration: f32,
    elapsed: f32,
}

impl MantleTransition {
    /// `start_cam_world` is where the camera was before the snap; it is
    /// expressed relative to the body's new pose so the view glides up.
    pub fn new(
        start_cam_world: Vec3,
        target_position: Vec3,
        rotation: &UnitQuaternion<f32>,
        cam_height: f32,
        duration: f32,
    ) -> Self {
        let up = rotation * Vec3::y();
        let target_cam_world = target_position + up * cam_height;
        let inverse = rotation.inverse();
        Self {
            start_cam_local: inverse * (start_cam_world - target_position),
            target_cam_local: inverse * (target_cam_world - target_position),
            duration: duration.max(0.0),
            elapsed: 0.0,
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn target_cam_local(&self) -> Vec3 {
        self.target_cam_local
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn sample(&self) -> Vec3 {
        if self.is_finished() {
            return self.target_cam_local;
        }
        let t = ease_in_out(self.elapsed / self.duration);
        lerp_vec(&self.start_cam_local, &self.target_cam_local, t)
    }

    pub fn apply(&self, view: &mut impl ViewRig) {
        view.set_local_position(self.sample());
    }

    pub fn advance(&mut self, dt: f32, view: &mut impl ViewRig) -> bool {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.apply(view);
        self.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::backend::CameraRig;

    #[test]
    fn test_duration_scales_with_height_delta() {
        assert!((crouch_duration(0.5, 2.0, 1.0, 2.0, 1.0) - 0.5).abs() < 1e-6);
        assert!((crouch_duration(0.5, 1.5, 1.0, 2.0, 1.0) - 0.25).abs() < 1e-6);
        assert_eq!(crouch_duration(0.5, 2.0, 1.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_crouch_sample_eases_between_heights() {
        let mut t = CrouchTransition::new(2.0, 1.0, 1.7, 0.85, 0.5);
        assert_eq!(t.sample(), (2.0, 1.7));
        t.elapsed = 0.25;
        let (collider, cam) = t.sample();
        assert!((collider - 1.5).abs() < 1e-6);
        assert!((cam - 1.275).abs() < 1e-6);
        t.elapsed = 0.5;
        assert_eq!(t.sample(), (1.0, 0.85));
    }

    #[test]
    fn test_zero_duration_is_finished_immediately() {
        let t = CrouchTransition::new(2.0, 1.0, 1.7, 0.85, 0.0);
        assert!(t.is_finished());
        assert_eq!(t.sample(), (1.0, 0.85));
    }

    #[test]
    fn test_mantle_camera_glides_to_target() {
        let rot = UnitQuaternion::identity();
        let mut t = MantleTransition::new(
            Vec3::new(0.0, 1.7, 0.0),
            Vec3::new(0.0, 1.0, 0.5),
            &rot,
            1.7,
            0.5,
        );
        let mut rig = CameraRig::new(1.7);
        t.apply(&mut rig);
        assert!((rig.offset - Vec3::new(0.0, 0.7, -0.5)).norm() < 1e-6);
        let mut done = false;
        for _ in 0..30 {
            done = t.advance(0.02, &mut rig);
            if done {
                break;
            }
        }
        assert!(done);
        assert!((rig.offset - Vec3::new(0.0, 1.7, 0.0)).norm() < 1e-6);
    }
}
