//! Scenario files: a level, a spawn point and a timed input script.
//!
//! ```toml
//! name = "crouch under beam"
//! duration = 3.0
//! spawn = [0.0, 0.0, 0.0]
//!
//! [controller.crouch]
//! mode = "toggle"
//!
//! [[parts]]
//! position = [0.0, -0.5, 0.0]
//! size = [50.0, 1.0, 50.0]
//!
//! [[inputs]]
//! start = 0.5
//! end = 0.6
//! crouch = true
//! ```

use nalgebra::UnitQuaternion;
use serde::Deserialize;
use std::path::Path;

use crate::config::{ConfigError, ControllerConfig};
use crate::controller::constants::FIXED_TIMESTEP;
use crate::controller::input::RawInput;
use crate::physics::{PartShape, PhysicsWorld};

/// Character ID used for the scenario's walker
pub const PLAYER_ID: u64 = 1;

/// A static piece of level geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PartSpec {
    pub position: [f32; 3],
    pub size: [f32; 3],
    /// Euler angles in degrees (roll, pitch, yaw)
    pub rotation: [f32; 3],
    pub shape: PartShape,
    pub can_collide: bool,
}

impl Default for PartSpec {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            size: [1.0; 3],
            rotation: [0.0; 3],
            shape: PartShape::Block,
            can_collide: true,
        }
    }
}

impl PartSpec {
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        let [r, p, y] = self.rotation;
        UnitQuaternion::from_euler_angles(r.to_radians(), p.to_radians(), y.to_radians())
    }
}

/// Input held over `[start, end)` seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct InputSpan {
    pub start: f32,
    pub end: f32,
    #[serde(flatten)]
    pub input: RawInput,
}

impl InputSpan {
    fn covers(&self, time: f32) -> bool {
        time >= self.start && time < self.end
    }
}

/// Sound pack attached to the walker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SoundSpec {
    pub clips: usize,
    pub volume: f32,
    pub pitch: f32,
    /// Fixed seed for reproducible traces
    pub seed: Option<u64>,
}

impl Default for SoundSpec {
    fn default() -> Self {
        Self {
            clips: 0,
            volume: 1.0,
            pitch: 1.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    /// Seconds
    pub duration: f32,
    /// Rendered frames per second
    pub frame_rate: f32,
    /// Fixed physics step
    pub fixed_timestep: f32,
    /// Feet position
    pub spawn: [f32; 3],
    /// Initial look yaw, degrees
    pub yaw: f32,
    pub controller: ControllerConfig,
    pub sounds: SoundSpec,
    pub parts: Vec<PartSpec>,
    pub inputs: Vec<InputSpan>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            duration: 5.0,
            frame_rate: 60.0,
            fixed_timestep: FIXED_TIMESTEP,
            spawn: [0.0; 3],
            yaw: 0.0,
            controller: ControllerConfig::default(),
            sounds: SoundSpec::default(),
            parts: Vec::new(),
            inputs: Vec::new(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let scenario: Self =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        for (name, value) in [
            ("duration", self.duration),
            ("frame_rate", self.frame_rate),
            ("fixed_timestep", self.fixed_timestep),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("sounds.volume", self.sounds.volume),
            ("sounds.pitch", self.sounds.pitch),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        for (i, span) in self.inputs.iter().enumerate() {
            if span.end < span.start {
                return Err(ConfigError::Invalid(format!(
                    "inputs[{}] ends before it starts ({} < {})",
                    i, span.end, span.start
                )));
            }
        }
        Ok(())
    }

    pub fn frame_dt(&self) -> f32 {
        1.0 / self.frame_rate
    }

    pub fn frame_count(&self) -> usize {
        (self.duration * self.frame_rate).round() as usize
    }

    /// Combined input at `time`: buttons are OR-ed, axes summed.
    pub fn input_at(&self, time: f32) -> RawInput {
        self.inputs
            .iter()
            .filter(|span| span.covers(time))
            .fold(RawInput::default(), |mut acc, span| {
                let i = &span.input;
                acc.move_axis[0] += i.move_axis[0];
                acc.move_axis[1] += i.move_axis[1];
                acc.look_delta[0] += i.look_delta[0];
                acc.look_delta[1] += i.look_delta[1];
                acc.jump |= i.jump;
                acc.crouch |= i.crouch;
                acc.sprint |= i.sprint;
                acc
            })
    }

    /// Level geometry plus the walker body at the spawn point.
    pub fn build_world(&self) -> PhysicsWorld {
        let mut world = PhysicsWorld::new();
        for (i, part) in self.parts.iter().enumerate() {
            world.add_part(
                i as u64 + 100,
                part.position,
                part.rotation(),
                part.size,
                part.can_collide,
                part.shape,
            );
        }
        world.add_character(PLAYER_ID, self.spawn, &self.controller);
        world.update_queries();
        world
    }
}
