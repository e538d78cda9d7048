//! Typed views over the game's state map.

use crate::config::GameConfig;
use std::fmt;
use std::str::FromStr;
use vision_ui::{state, StateMap, Value};

pub const SIZE: &str = "size";
pub const CONTAINER_WIDTH: &str = "container_width";
pub const STATUS: &str = "status";
pub const MOVING: &str = "moving";
pub const START_CLASS_NAME: &str = "start_class_name";
pub const POSITION: &str = "position";
pub const START_INDEX: &str = "start_index";
pub const IS_WIN: &str = "is_win";

/// Phase of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Init,
    /// The tile to remember is shown.
    Start,
    Moving,
    /// Shuffling is over, waiting for a pick.
    Waiting,
    Over,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Init => "init",
            Status::Start => "start",
            Status::Moving => "moving",
            Status::Waiting => "waiting",
            Status::Over => "over",
        }
    }

    /// Whether a new round may begin.
    pub fn can_start(self) -> bool {
        matches!(self, Status::Init | Status::Over)
    }

    /// Whether the start tile is highlighted.
    pub fn reveals_start(self) -> bool {
        matches!(self, Status::Start | Status::Over)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Status::Init),
            "start" => Ok(Status::Start),
            "moving" => Ok(Status::Moving),
            "waiting" => Ok(Status::Waiting),
            "over" => Ok(Status::Over),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

impl From<Status> for Value {
    fn from(status: Status) -> Self {
        Value::from(status.as_str())
    }
}

/// Snapshot of the game state read out of a [`StateMap`].
///
/// Missing or malformed entries fall back to the initial values.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub size: usize,
    pub container_width: f64,
    pub status: Status,
    pub start_class_name: String,
    pub position: Vec<usize>,
    pub start_index: Option<usize>,
    pub is_win: Option<bool>,
}

impl GameState {
    pub fn read(state: &StateMap) -> Self {
        let index = |v: &Value| v.as_i64().and_then(|n| usize::try_from(n).ok());
        Self {
            size: state.get(SIZE).and_then(index).unwrap_or(0),
            container_width: state.get(CONTAINER_WIDTH).and_then(Value::as_f64).unwrap_or(0.0),
            status: state
                .get(STATUS)
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or(Status::Init),
            start_class_name: state
                .get(START_CLASS_NAME)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            position: state
                .get(POSITION)
                .and_then(Value::as_list)
                .map(|items| items.iter().filter_map(index).collect())
                .unwrap_or_default(),
            start_index: state.get(START_INDEX).and_then(index),
            is_win: state.get(IS_WIN).and_then(Value::as_bool),
        }
    }

    /// Width and height of one tile in px.
    pub fn tile_size(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.container_width / self.size as f64
    }
}

/// The state a fresh board starts from; positions are filled in by the
/// `init_tile_position` action.
pub fn initial_state(config: &GameConfig) -> StateMap {
    state! {
        SIZE => config.size,
        CONTAINER_WIDTH => config.container_width,
        STATUS => Status::Init,
        MOVING => false,
        START_CLASS_NAME => config.start_class_name.as_str(),
    }
}
