//! Game configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config
//! except for `container_width`, which the host must provide because an
//! in-memory surface has no layout to measure.

use crate::error::{GameError, GameResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Tiles per row; the board holds `size * size` tiles.
    pub size: usize,
    /// Pause between two shuffles.
    #[serde(rename = "move_interval_ms")]
    pub move_interval: u64,
    /// Duration of the tile slide transition.
    #[serde(rename = "move_duration_ms")]
    pub move_duration: u64,
    /// Number of shuffles in one round.
    pub move_steps: u32,
    /// Delay before moving starts and again before the first shuffle.
    #[serde(rename = "start_delay_ms")]
    pub start_delay: u64,
    /// Extra class marking the tile to remember.
    pub start_class_name: String,
    pub start_button_text: String,
    pub retry_button_text: String,
    /// Board width in px.
    pub container_width: f64,
    /// Seed for a reproducible round.
    pub seed: Option<u64>,
}

fn default_size() -> usize {
    4
}

fn default_move_interval() -> u64 {
    800
}

fn default_move_duration() -> u64 {
    800
}

fn default_move_steps() -> u32 {
    5
}

fn default_start_delay() -> u64 {
    1000
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            move_interval: default_move_interval(),
            move_duration: default_move_duration(),
            move_steps: default_move_steps(),
            start_delay: default_start_delay(),
            start_class_name: String::new(),
            start_button_text: "START !".to_string(),
            retry_button_text: "RETRY !".to_string(),
            container_width: 0.0,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn from_toml_str(source: &str) -> GameResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> GameResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks the values a board cannot be built from.
    pub fn validate(&self) -> GameResult<()> {
        if self.container_width.is_nan() || self.container_width <= 0.0 {
            return Err(GameError::InvalidWidth(self.container_width));
        }
        // a single tile cannot be swapped with another one
        if self.size < 2 {
            return Err(GameError::InvalidSize(self.size));
        }
        Ok(())
    }

    pub fn tile_count(&self) -> usize {
        self.size * self.size
    }

    pub fn move_interval(&self) -> Duration {
        Duration::from_millis(self.move_interval)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay)
    }

    /// Inline `transition` value for tiles, e.g. `left 0.8s, top 0.8s`.
    pub fn tile_transition(&self) -> String {
        let seconds = self.move_duration as f64 / 1000.0;
        format!("left {seconds}s, top {seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn empty_document_uses_defaults() {
        let config = GameConfig::from_toml_str("").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.size, 4);
        assert_eq!(config.move_steps, 5);
        assert_eq!(config.start_button_text, "START !");
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = GameConfig::from_toml_str(
            r#"
            size = 3
            move_interval_ms = 250
            start_class_name = "my-icon"
            container_width = 300.0
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.size, 3);
        assert_eq!(config.move_interval(), Duration::from_millis(250));
        assert_eq!(config.move_duration, 800);
        assert_eq!(config.start_class_name, "my-icon");
        assert_eq!(config.seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = GameConfig::from_toml_str("size = \"big\"").unwrap_err();
        assert!(matches!(err, GameError::Config(_)));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = GameConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test_case(0.0, 4 ; "zero width")]
    #[test_case(-10.0, 4 ; "negative width")]
    #[test_case(f64::NAN, 4 ; "nan width")]
    fn rejects_width(width: f64, size: usize) {
        let config = GameConfig {
            container_width: width,
            size,
            ..GameConfig::default()
        };
        assert!(matches!(config.validate(), Err(GameError::InvalidWidth(_))));
    }

    #[test_case(0 ; "empty board")]
    #[test_case(1 ; "single tile")]
    fn rejects_size(size: usize) {
        let config = GameConfig {
            container_width: 320.0,
            size,
            ..GameConfig::default()
        };
        assert!(matches!(config.validate(), Err(GameError::InvalidSize(n)) if n == size));
    }

    #[test]
    fn transition_uses_seconds() {
        let config = GameConfig {
            move_duration: 1500,
            ..GameConfig::default()
        };
        assert_eq!(config.tile_transition(), "left 1.5s, top 1.5s");
    }
}
