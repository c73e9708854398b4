//! Ceiling hit classification and stand-up clearance.
//!
//! The physics backend pushes the contact normals it saw during a step into
//! [`CeilingProbe::report_contacts`]. A hit latches until [`CeilingProbe::reset`]
//! runs at the end of the controller's fixed step.

use serde::Deserialize;

use super::backend::{CapsuleSpec, ClearanceQuery};
use super::math::{angle_deg, Vec3};

/// Which contacts of a batch are checked against the angle limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingDetectionMethod {
    /// Only the first contact of the batch
    #[default]
    FirstContact,
    /// Any contact within the limit registers a hit
    AnyContact,
    /// The mean angle over all contacts
    AverageOfContacts,
}

#[derive(Debug, Clone)]
pub struct CeilingProbe {
    pub method: CeilingDetectionMethod,
    /// Degrees between a contact normal and straight down
    pub angle_limit: f32,
    ceiling_hit: bool,
}

impl CeilingProbe {
    pub fn new(method: CeilingDetectionMethod, angle_limit: f32) -> Self {
        Self {
            method,
            angle_limit,
            ceiling_hit: false,
        }
    }

    /// True if the batch qualifies as a ceiling hit. Empty batches never do.
    pub fn classify(&self, normals: &[Vec3], up: &Vec3) -> bool {
        let down = -up;
        match self.method {
            CeilingDetectionMethod::FirstContact => normals
                .first()
                .map(|n| angle_deg(&down, n) < self.angle_limit)
                .unwrap_or(false),
            CeilingDetectionMethod::AnyContact => normals
                .iter()
                .any(|n| angle_deg(&down, n) < self.angle_limit),
            CeilingDetectionMethod::AverageOfContacts => {
                if normals.is_empty() {
                    return false;
                }
                let total: f32 = normals.iter().map(|n| angle_deg(&down, n)).sum();
                total / (normals.len() as f32) < self.angle_limit
            }
        }
    }

    /// Feed one batch of contact normals; hits latch until `reset`.
    pub fn report_contacts(&mut self, normals: &[Vec3], up: &Vec3) {
        if self.classify(normals, up) {
            self.ceiling_hit = true;
        }
    }

    pub fn hit_ceiling(&self) -> bool {
        self.ceiling_hit
    }

    pub fn reset(&mut self) {
        self.ceiling_hit = false;
    }

    /// Sweeps the current (crouched) capsule up by the height difference.
    /// Degenerate heights (`standing <= crouched`) always allow standing.
    pub fn can_stand_up(
        &self,
        standing_height: f32,
        crouched_height: f32,
        capsule: &CapsuleSpec,
        world: &impl ClearanceQuery,
    ) -> bool {
        let delta = standing_height - crouched_height;
        if delta <= 0.0 {
            return true;
        }
        !world.capsule_sweep_hits(capsule, capsule.up, delta)
    }
}
