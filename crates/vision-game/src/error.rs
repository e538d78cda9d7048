use std::path::PathBuf;
use thiserror::Error;
use vision_ui::{ActionError, AppError, ElementId};

#[derive(Debug, Error)]
pub enum GameError {
    /// The mount target is not an element the board can live in
    #[error("did you forget to pass a container? {0} is not an element")]
    MissingContainer(ElementId),

    #[error("container must have an initial width, got {0}")]
    InvalidWidth(f64),

    #[error("board size must be at least 2, got {0}")]
    InvalidSize(usize),

    #[error("invalid game config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

pub type GameResult<T> = Result<T, GameError>;
