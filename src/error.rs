use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while assembling or driving a controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown character {0}")]
    UnknownCharacter(u64),
}
