//! Collaborator seams between the controller and whatever moves the body.
//!
//! The controller never touches a physics engine directly. Each fixed step it
//! reads the body through [`BodyActuator`], asks [`GroundProbe`] for support,
//! asks [`ClearanceQuery`] whether there is room to stand, and optionally asks
//! [`MantleDetector`] for a ledge. [`crate::physics::CharacterBody`] implements
//! all of them on top of rapier.

use nalgebra::UnitQuaternion;

use super::ground_probe::GroundProbe;
use super::math::Vec3;

/// Owner of the physical capsule.
pub trait BodyActuator {
    fn position(&self) -> Vec3;
    /// Teleport the body (used for mantle snaps).
    fn set_position(&mut self, position: Vec3);
    fn rotation(&self) -> UnitQuaternion<f32>;
    fn collider_height(&self) -> f32;
    fn set_collider_height(&mut self, height: f32);
    fn radius(&self) -> f32;
    /// Velocity applied on the next physical step.
    fn set_velocity(&mut self, velocity: Vec3);
    fn velocity(&self) -> Vec3;

    /// Body up axis in world space.
    fn up(&self) -> Vec3 {
        self.rotation() * Vec3::y()
    }
}

/// World-space capsule description used for sweeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapsuleSpec {
    /// Center of the capsule
    pub center: Vec3,
    pub up: Vec3,
    /// Total height including the hemispherical caps
    pub height: f32,
    pub radius: f32,
}

impl CapsuleSpec {
    /// Distance from the center to each cap sphere center.
    pub fn segment_half_length(&self) -> f32 {
        (self.height * 0.5 - self.radius).max(0.0)
    }

    /// Cap sphere centers (bottom, top).
    pub fn endpoints(&self) -> (Vec3, Vec3) {
        let d = self.segment_half_length();
        (self.center - self.up * d, self.center + self.up * d)
    }
}

/// Sweeps against solid world geometry.
pub trait ClearanceQuery {
    /// True when moving `capsule` along `direction` by `distance` hits anything solid.
    fn capsule_sweep_hits(&self, capsule: &CapsuleSpec, direction: Vec3, distance: f32) -> bool;
}

/// Input to a mantle search.
#[derive(Debug, Clone, Copy)]
pub struct MantleQuery {
    /// Bottom of the body, on the ground
    pub ground_point: Vec3,
    /// Horizontal facing direction
    pub forward: Vec3,
    pub up: Vec3,
    pub standing_height: f32,
    pub crouched_height: f32,
    pub radius: f32,
    /// Fraction of the collider that the ground sensor covers
    pub step_height_ratio: f32,
}

/// A ledge the body can be placed onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MantleTarget {
    /// Body position after the mantle
    pub position: Vec3,
    /// Only a crouched body fits on the ledge
    pub crouch: bool,
}

/// Obstacle + ledge detector consulted before a jump.
pub trait MantleDetector {
    fn find_mantle(&self, query: &MantleQuery) -> Option<MantleTarget>;
}

/// Everything the controller needs from the physical world for one body.
pub trait CharacterBackend: BodyActuator + GroundProbe + ClearanceQuery + MantleDetector {}

impl<T> CharacterBackend for T where T: BodyActuator + GroundProbe + ClearanceQuery + MantleDetector {}

/// Sink for camera offset changes driven by crouch and mantle.
pub trait ViewRig {
    /// Camera height above the body origin, in body-local space.
    fn local_height(&self) -> f32;
    fn set_local_height(&mut self, height: f32);
    fn local_position(&self) -> Vec3;
    fn set_local_position(&mut self, position: Vec3);
}

/// Plain camera offset holder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub offset: Vec3,
}

impl CameraRig {
    pub fn new(height: f32) -> Self {
        Self {
            offset: Vec3::new(0.0, height, 0.0),
        }
    }
}

impl ViewRig for CameraRig {
    fn local_height(&self) -> f32 {
        self.offset.y
    }

    fn set_local_height(&mut self, height: f32) {
        self.offset.y = height;
    }

    fn local_position(&self) -> Vec3 {
        self.offset
    }

    fn set_local_position(&mut self, position: Vec3) {
        self.offset = position;
    }
}
