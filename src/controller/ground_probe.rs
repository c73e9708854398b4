//! Ground sensing contract and the sensor-range math shared by backends.

use super::math::{angle_deg, Vec3};

/// Ground support sampled for one fixed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundSample {
    pub grounded: bool,
    /// Surface normal of the support (body up when not grounded)
    pub normal: Vec3,
    /// Contact point under the body
    pub ground_point: Vec3,
}

impl GroundSample {
    pub fn airborne(up: Vec3, ground_point: Vec3) -> Self {
        Self {
            grounded: false,
            normal: up,
            ground_point,
        }
    }

    /// Slope of the support relative to `up`, in degrees.
    pub fn slope_angle(&self, up: &Vec3) -> f32 {
        angle_deg(&self.normal, up)
    }

    /// Ungrounded samples count as too steep.
    pub fn is_too_steep(&self, up: &Vec3, slope_limit_deg: f32) -> bool {
        if !self.grounded {
            return true;
        }
        self.slope_angle(up) > slope_limit_deg
    }
}

/// Queries the environment beneath the body.
pub trait GroundProbe {
    /// Widens the query while grounded so stairs and slope crests stay in contact.
    fn set_extended_sensor_range(&mut self, extended: bool);
    fn probe(&mut self) -> GroundSample;
}

/// Sensor reach below the capsule bottom for a given collider height.
pub fn sensor_range(
    collider_height: f32,
    step_height_ratio: f32,
    sensor_extension_ratio: f32,
    extended: bool,
) -> f32 {
    let base = collider_height * step_height_ratio;
    if extended {
        base + collider_height * sensor_extension_ratio
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airborne_sample_is_too_steep() {
        let sample = GroundSample::airborne(Vec3::y(), Vec3::zeros());
        assert!(sample.is_too_steep(&Vec3::y(), 80.0));
    }

    #[test]
    fn test_slope_over_limit_is_too_steep() {
        let tilt = 85.0_f32.to_radians();
        let sample = GroundSample {
            grounded: true,
            normal: Vec3::new(tilt.sin(), tilt.cos(), 0.0),
            ground_point: Vec3::zeros(),
        };
        assert!(sample.is_too_steep(&Vec3::y(), 80.0));
        assert!(!sample.is_too_steep(&Vec3::y(), 89.0));
    }

    #[test]
    fn test_extended_range_adds_extension() {
        assert!((sensor_range(2.0, 0.25, 0.5, false) - 0.5).abs() < 1e-6);
        assert!((sensor_range(2.0, 0.25, 0.5, true) - 1.5).abs() < 1e-6);
    }
}
