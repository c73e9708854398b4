//! First-person locomotion controller.

pub mod backend;
pub mod ceiling;
pub mod constants;
pub mod footsteps;
pub mod ground_probe;
pub mod input;
pub mod math;
pub mod momentum;
pub mod state;
pub mod transition;
pub mod walker;

pub use backend::{BodyActuator, CameraRig, CharacterBackend, MantleTarget, ViewRig};
pub use input::RawInput;
pub use state::ControllerState;
pub use walker::{ControllerEvent, Walker, WalkerBuilder};
