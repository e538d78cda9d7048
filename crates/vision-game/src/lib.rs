//! # vision-game
//!
//! A memory game on top of [`vision_ui`]: one tile is highlighted, the
//! board shuffles a few times, and the player has to find it again.
//!
//! [`Vision`] owns the app and the round timers; [`GameConfig`] carries the
//! tunables and loads from TOML.

pub mod actions;
pub mod config;
pub mod error;
pub mod state;
pub mod view;
pub mod vision;

pub use actions::{game_actions, shuffle, GameContext, GameOverHook};
pub use config::GameConfig;
pub use error::{GameError, GameResult};
pub use state::{initial_state, GameState, Status};
pub use view::{game_view, tile, tile_container, Controls, Tile};
pub use vision::Vision;
