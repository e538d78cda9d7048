use clap::Parser;
use std::path::PathBuf;
use vision_game::GameConfig;

/// Board width used when neither the config file nor `--width` sets one.
pub const DEFAULT_WIDTH: f64 = 320.0;

#[derive(Debug, Parser)]
#[command(name = "vision")]
#[command(about = "Remember the highlighted tile, watch the board shuffle, pick it again")]
#[command(version)]
pub struct Cli {
    /// Game config file (TOML)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Tiles per row (overrides config file)
    #[arg(short, long)]
    pub size: Option<usize>,

    /// Board width in px (overrides config file)
    #[arg(short, long)]
    pub width: Option<f64>,

    /// Seed for a reproducible round (overrides config file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Slot to pick once the board stops; defaults to the start tile
    #[arg(short, long)]
    pub pick: Option<usize>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Loads the config file, if any, and applies command-line overrides.
    pub fn game_config(&self) -> vision_game::GameResult<GameConfig> {
        let mut config = match &self.config {
            Some(path) => GameConfig::load(path)?,
            None => GameConfig::default(),
        };
        if let Some(size) = self.size {
            config.size = size;
        }
        if let Some(width) = self.width {
            config.container_width = width;
        } else if config.container_width == 0.0 {
            config.container_width = DEFAULT_WIDTH;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let cli = Cli::parse_from(["vision", "--size", "3", "--seed", "42", "--pick", "2"]);
        let config = cli.game_config().unwrap();

        assert_eq!(config.size, 3);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.container_width, DEFAULT_WIDTH);
        assert_eq!(cli.pick, Some(2));
    }

    #[test]
    fn explicit_width_wins() {
        let cli = Cli::parse_from(["vision", "-w", "200"]);
        assert_eq!(cli.game_config().unwrap().container_width, 200.0);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["vision", "-C", "/no/such/vision.toml"]);
        assert!(cli.game_config().is_err());
    }
}
