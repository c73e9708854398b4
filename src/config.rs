//! Controller configuration parsing from walker.toml files

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::controller::ceiling::CeilingDetectionMethod;
use crate::controller::constants::{body, ceiling, crouch, ground, jump, movement};
use crate::controller::momentum::FrictionModel;

/// How the crouch key is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrouchMode {
    /// Crouch exactly while the key is held
    #[default]
    Hold,
    /// Each press flips the desire to stand
    Toggle,
}

/// Movement section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub walk_speed: f32,
    pub sprint_speed: f32,
    pub crouched_speed: f32,
    pub air_control_rate: f32,
    pub air_friction: f32,
    pub ground_friction: f32,
    pub friction_model: FrictionModel,
    pub gravity: f32,
    pub slide_gravity: f32,
    /// Degrees
    pub slope_limit: f32,
    /// Store momentum relative to the body rotation
    pub use_local_momentum: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: movement::WALK_SPEED,
            sprint_speed: movement::SPRINT_SPEED,
            crouched_speed: movement::CROUCHED_SPEED,
            air_control_rate: movement::AIR_CONTROL_RATE,
            air_friction: movement::AIR_FRICTION,
            ground_friction: movement::GROUND_FRICTION,
            friction_model: FrictionModel::default(),
            gravity: movement::GRAVITY,
            slide_gravity: movement::SLIDE_GRAVITY,
            slope_limit: movement::SLOPE_LIMIT_DEG,
            use_local_momentum: false,
        }
    }
}

/// Jump section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JumpConfig {
    pub jump_speed: f32,
    pub jump_duration: f32,
    /// Try a mantle before jumping
    pub mantle_enabled: bool,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            jump_speed: jump::JUMP_SPEED,
            jump_duration: jump::JUMP_DURATION,
            mantle_enabled: true,
        }
    }
}

/// Crouch section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrouchConfig {
    pub mode: CrouchMode,
    pub crouched_height: f32,
    pub crouch_trans_time: f32,
    pub mantle_trans_time: f32,
}

impl Default for CrouchConfig {
    fn default() -> Self {
        Self {
            mode: CrouchMode::Hold,
            crouched_height: crouch::CROUCHED_HEIGHT,
            crouch_trans_time: crouch::CROUCH_TRANS_TIME,
            mantle_trans_time: crouch::MANTLE_TRANS_TIME,
        }
    }
}

/// Ceiling detection section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CeilingConfig {
    pub method: CeilingDetectionMethod,
    /// Degrees from straight down
    pub angle_limit: f32,
}

impl Default for CeilingConfig {
    fn default() -> Self {
        Self {
            method: CeilingDetectionMethod::default(),
            angle_limit: ceiling::CEILING_ANGLE_LIMIT_DEG,
        }
    }
}

/// Ground sensor section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    pub step_height_ratio: f32,
    pub sensor_extension_ratio: f32,
    pub skin_width: f32,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            step_height_ratio: ground::STEP_HEIGHT_RATIO,
            sensor_extension_ratio: ground::SENSOR_EXTENSION_RATIO,
            skin_width: ground::SKIN_WIDTH,
        }
    }
}

/// Body and view section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    pub standing_height: f32,
    pub radius: f32,
    pub standing_cam_height: f32,
    pub look_sensitivity: f32,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            standing_height: body::STANDING_HEIGHT,
            radius: body::RADIUS,
            standing_cam_height: body::STANDING_CAM_HEIGHT,
            look_sensitivity: body::LOOK_SENSITIVITY,
        }
    }
}

/// Full controller configuration from walker.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub movement: MovementConfig,
    pub jump: JumpConfig,
    pub crouch: CrouchConfig,
    pub ceiling: CeilingConfig,
    pub ground: GroundConfig,
    pub body: BodyConfig,
}

impl ControllerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the integrator cannot work with.
    /// A crouched height at or above standing height is allowed (stand-up is
    /// then always permitted and height transitions are instant).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("movement.walk_speed", self.movement.walk_speed),
            ("movement.sprint_speed", self.movement.sprint_speed),
            ("movement.crouched_speed", self.movement.crouched_speed),
            ("movement.air_control_rate", self.movement.air_control_rate),
            ("movement.air_friction", self.movement.air_friction),
            ("movement.ground_friction", self.movement.ground_friction),
            ("movement.gravity", self.movement.gravity),
            ("movement.slide_gravity", self.movement.slide_gravity),
            ("jump.jump_speed", self.jump.jump_speed),
            ("jump.jump_duration", self.jump.jump_duration),
            ("crouch.crouch_trans_time", self.crouch.crouch_trans_time),
            ("crouch.mantle_trans_time", self.crouch.mantle_trans_time),
            ("ground.step_height_ratio", self.ground.step_height_ratio),
            ("ground.sensor_extension_ratio", self.ground.sensor_extension_ratio),
            ("ground.skin_width", self.ground.skin_width),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        let positive = [
            ("body.standing_height", self.body.standing_height),
            ("body.radius", self.body.radius),
            ("crouch.crouched_height", self.crouch.crouched_height),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        // The collider is lifted by the step height and needs some length left
        if !(0.0..1.0).contains(&self.ground.step_height_ratio) {
            return Err(ConfigError::Invalid(format!(
                "ground.step_height_ratio must be within [0, 1), got {}",
                self.ground.step_height_ratio
            )));
        }
        if !self.body.standing_cam_height.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "body.standing_cam_height must be finite, got {}",
                self.body.standing_cam_height
            )));
        }
        if !self.body.look_sensitivity.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "body.look_sensitivity must be finite, got {}",
                self.body.look_sensitivity
            )));
        }

        if !(0.0..=180.0).contains(&self.movement.slope_limit) {
            return Err(ConfigError::Invalid(format!(
                "movement.slope_limit must be within [0, 180] degrees, got {}",
                self.movement.slope_limit
            )));
        }
        if !(0.0..=180.0).contains(&self.ceiling.angle_limit) {
            return Err(ConfigError::Invalid(format!(
                "ceiling.angle_limit must be within [0, 180] degrees, got {}",
                self.ceiling.angle_limit
            )));
        }
        Ok(())
    }

    /// Camera height when crouched, scaled from the standing ratio.
    pub fn crouched_cam_height(&self) -> f32 {
        self.body.standing_cam_height / self.body.standing_height * self.crouch.crouched_height
    }
}

/// Errors that can occur when loading controller configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config: ControllerConfig = toml::from_str("").unwrap();
        assert_eq!(config.movement.walk_speed, movement::WALK_SPEED);
        assert_eq!(config.jump.jump_duration, jump::JUMP_DURATION);
        assert_eq!(config.crouch.mode, CrouchMode::Hold);
        assert_eq!(config.ceiling.method, CeilingDetectionMethod::FirstContact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [movement]
            walk_speed = 5.0
            friction_model = "linear"

            [crouch]
            mode = "toggle"
            crouched_height = 1.2

            [ceiling]
            method = "average_of_contacts"
            angle_limit = 15.0
        "#;
        let config: ControllerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.movement.walk_speed, 5.0);
        assert_eq!(config.movement.sprint_speed, movement::SPRINT_SPEED);
        assert_eq!(config.movement.friction_model, FrictionModel::Linear);
        assert_eq!(config.crouch.mode, CrouchMode::Toggle);
        assert_eq!(config.crouch.crouched_height, 1.2);
        assert_eq!(config.ceiling.method, CeilingDetectionMethod::AverageOfContacts);
        assert_eq!(config.ceiling.angle_limit, 15.0);
    }

    #[test]
    fn test_validate_rejects_negative_gravity() {
        let mut config = ControllerConfig::default();
        config.movement.gravity = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("movement.gravity"));
    }

    #[test]
    fn test_validate_rejects_step_ratio_of_whole_body() {
        let mut config = ControllerConfig::default();
        config.ground.step_height_ratio = 1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ground.step_height_ratio"));

        config.ground.step_height_ratio = 1.5;
        assert!(config.validate().is_err());

        config.ground.step_height_ratio = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_view_settings() {
        let mut config = ControllerConfig::default();
        config.body.standing_cam_height = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.body.look_sensitivity = f32::INFINITY;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("body.look_sensitivity"));
    }

    #[test]
    fn test_degenerate_crouch_heights_are_valid() {
        let mut config = ControllerConfig::default();
        config.crouch.crouched_height = config.body.standing_height + 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_crouched_cam_height_scales_with_height() {
        let mut config = ControllerConfig::default();
        config.body.standing_height = 2.0;
        config.body.standing_cam_height = 1.8;
        config.crouch.crouched_height = 1.0;
        assert!((config.crouched_cam_height() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ControllerConfig::from_file(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}
