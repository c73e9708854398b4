//! Controller tuning defaults and thresholds.
//! Config deserialization falls back to these when a field is omitted.

/// Movement defaults (units/second unless noted)
pub mod movement {
    /// Walk speed
    pub const WALK_SPEED: f32 = 3.0;

    /// Sprint speed
    pub const SPRINT_SPEED: f32 = 4.3;

    /// Speed while crouched
    pub const CROUCHED_SPEED: f32 = 1.5;

    /// How fast direction can change in the air; higher is more control
    pub const AIR_CONTROL_RATE: f32 = 2.0;

    /// Multiplier on air control once external momentum exceeds walk speed
    pub const AIR_CONTROL_DAMPING: f32 = 0.25;

    /// Momentum loss rate while airborne or sliding
    pub const AIR_FRICTION: f32 = 0.5;

    /// Momentum loss rate while grounded
    pub const GROUND_FRICTION: f32 = 100.0;

    /// Downward acceleration
    pub const GRAVITY: f32 = 30.0;

    /// Extra acceleration down steep slopes
    pub const SLIDE_GRAVITY: f32 = 5.0;

    /// Steepest walkable slope, degrees
    pub const SLOPE_LIMIT_DEG: f32 = 80.0;

    /// Vertical momentum magnitude that counts as rising or falling
    pub const VERTICAL_MOMENTUM_THRESHOLD: f32 = 0.001;
}

/// Jump defaults
pub mod jump {
    /// Upward speed held for the duration of a jump
    pub const JUMP_SPEED: f32 = 10.0;

    /// Seconds the jump speed is held while the key stays down
    pub const JUMP_DURATION: f32 = 0.2;
}

/// Crouch and mantle defaults
pub mod crouch {
    /// Collider height when crouched
    pub const CROUCHED_HEIGHT: f32 = 1.0;

    /// Seconds for a full stand <-> crouch transition
    pub const CROUCH_TRANS_TIME: f32 = 0.5;

    /// Seconds for the camera to settle after a mantle
    pub const MANTLE_TRANS_TIME: f32 = 0.5;
}

/// Ceiling detection defaults
pub mod ceiling {
    /// Max angle (degrees) between a contact normal and straight down
    pub const CEILING_ANGLE_LIMIT_DEG: f32 = 10.0;
}

/// Ground sensor defaults
pub mod ground {
    /// Base sensor reach as a fraction of collider height
    pub const STEP_HEIGHT_RATIO: f32 = 0.25;

    /// Extra reach (fraction of collider height) while grounded or sliding.
    /// Kept below the step ratio so real drops still read as ungrounded.
    pub const SENSOR_EXTENSION_RATIO: f32 = 0.1;

    /// Gap kept between the capsule and the ground by the sensor cast
    pub const SKIN_WIDTH: f32 = 0.02;
}

/// Body and view defaults
pub mod body {
    /// Standing collider height
    pub const STANDING_HEIGHT: f32 = 2.0;

    /// Capsule radius
    pub const RADIUS: f32 = 0.4;

    /// Camera height above the body origin when standing
    pub const STANDING_CAM_HEIGHT: f32 = 1.7;

    /// Clamp for look pitch, degrees
    pub const PITCH_LIMIT_DEG: f32 = 80.0;

    /// Look sensitivity (degrees per unit of look delta)
    pub const LOOK_SENSITIVITY: f32 = 0.1;
}

/// Rapier backend tuning
pub mod physics {
    /// Gap the kinematic controller keeps from obstacles
    pub const CONTROLLER_OFFSET: f32 = 0.02;

    /// How far past the capsule a wall may be to count as a mantle obstacle
    pub const MANTLE_REACH: f32 = 0.5;

    /// Highest mantleable ledge as a fraction of standing height
    pub const MANTLE_MAX_HEIGHT_RATIO: f32 = 1.0;

    /// Minimum cosine between facing and the wall's inward normal
    pub const MANTLE_MIN_FACING_COS: f32 = 0.7;

    /// Minimum cosine between the ledge normal and up
    pub const MANTLE_MIN_LEDGE_COS: f32 = 0.7;
}

/// Body transition sound defaults
pub mod sound {
    /// Attempts made to pick a clip different from the previous one
    pub const MAX_RESAMPLE_TRIES: u32 = 4;

    /// Random deviation applied to volume and pitch
    pub const DEVIATION: f32 = 0.15;
}

/// Fixed simulation step (50 Hz)
pub const FIXED_TIMESTEP: f32 = 1.0 / 50.0;

/// Tolerance for comparing accumulated times
pub const TIME_EPSILON: f32 = 1.0e-4;

/// Small epsilon for vector length checks
pub const EPSILON: f32 = 1.0e-6;
