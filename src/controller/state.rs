//! Locomotion states and the transition table.

use serde::Serialize;

/// Exactly one is active per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Grounded,
    Sliding,
    Falling,
    Rising,
    Jumping,
}

impl ControllerState {
    /// Grounded or sliding down a slope.
    pub fn is_grounded(self) -> bool {
        matches!(self, ControllerState::Grounded | ControllerState::Sliding)
    }

    pub fn name(self) -> &'static str {
        match self {
            ControllerState::Grounded => "grounded",
            ControllerState::Sliding => "sliding",
            ControllerState::Falling => "falling",
            ControllerState::Rising => "rising",
            ControllerState::Jumping => "jumping",
        }
    }
}

impl Default for ControllerState {
    /// Bodies spawn in the air until the first ground probe succeeds.
    fn default() -> Self {
        ControllerState::Falling
    }
}

/// Observations the transition table reads each fixed step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateInputs {
    /// Ground probe reports support
    pub grounded: bool,
    /// Support is steeper than the slope limit (always true when ungrounded)
    pub too_steep: bool,
    /// Vertical momentum above threshold and pointing up
    pub rising: bool,
    /// Ceiling probe latched a hit this step
    pub ceiling_hit: bool,
    /// Seconds since the current jump started
    pub jump_elapsed: f32,
    pub jump_duration: f32,
    /// Jump key released since the previous step
    pub jump_released: bool,
}

impl StateInputs {
    fn sliding(&self) -> bool {
        self.grounded && self.too_steep
    }

    fn jump_timed_out(&self) -> bool {
        self.jump_elapsed + super::constants::TIME_EPSILON >= self.jump_duration
    }
}

/// Side effect a transition asks the controller to run on momentum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Fold movement velocity into momentum
    GroundContactLost,
    /// Fire the landing callback
    GroundContactRegained,
    /// Strip vertical momentum
    CeilingContact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: ControllerState,
    pub effect: Option<TransitionEffect>,
}

impl Transition {
    fn stay(state: ControllerState) -> Self {
        Self { state, effect: None }
    }

    fn with(state: ControllerState, effect: TransitionEffect) -> Self {
        Self {
            state,
            effect: Some(effect),
        }
    }
}

/// Next state from the current one. Pure; the caller applies the effect.
pub fn next_state(current: ControllerState, inputs: &StateInputs) -> Transition {
    use ControllerState::*;
    use TransitionEffect::*;

    let sliding = inputs.sliding();

    match current {
        Grounded => {
            if inputs.rising {
                Transition::with(Rising, GroundContactLost)
            } else if !inputs.grounded {
                Transition::with(Falling, GroundContactLost)
            } else if sliding {
                Transition::with(Sliding, GroundContactLost)
            } else {
                Transition::stay(Grounded)
            }
        }
        Falling => {
            if inputs.rising {
                Transition::stay(Rising)
            } else if inputs.grounded && !sliding {
                Transition::with(Grounded, GroundContactRegained)
            } else if sliding {
                Transition::stay(Sliding)
            } else {
                Transition::stay(Falling)
            }
        }
        Sliding => {
            if inputs.rising {
                Transition::with(Rising, GroundContactLost)
            } else if !inputs.grounded {
                Transition::with(Falling, GroundContactLost)
            } else if !sliding {
                Transition::with(Grounded, GroundContactRegained)
            } else {
                Transition::stay(Sliding)
            }
        }
        Rising => {
            if !inputs.rising {
                if inputs.grounded && !sliding {
                    return Transition::with(Grounded, GroundContactRegained);
                }
                if sliding {
                    return Transition::stay(Sliding);
                }
                if !inputs.grounded {
                    return Transition::stay(Falling);
                }
            }
            if inputs.ceiling_hit {
                Transition::with(Falling, CeilingContact)
            } else {
                Transition::stay(Rising)
            }
        }
        Jumping => {
            if inputs.jump_timed_out() || inputs.jump_released {
                Transition::stay(Rising)
            } else if inputs.ceiling_hit {
                Transition::with(Falling, CeilingContact)
            } else {
                Transition::stay(Jumping)
            }
        }
    }
}
