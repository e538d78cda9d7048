use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use vision_game::Vision;
use vision_ui::{EventLoop, MemorySurface, Mount};

mod cli;

use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vision_cli={level},vision_game={level},vision_ui={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.game_config().context("failed to load game config")?;
    debug!(?config, "config loaded");

    let outcome = Rc::new(Cell::new(None));
    let sink = Rc::clone(&outcome);
    let (surface, body) = MemorySurface::with_container("body");
    let vision = Vision::new(
        config,
        Mount::new(surface, body),
        Rc::new(EventLoop::new()),
        Some(Rc::new(move |win: bool| sink.set(Some(win)))),
    )
    .context("failed to build the board")?;
    vision.event_loop().settle().await;

    vision.start()?;
    vision.event_loop().settle().await;
    let start_index = vision
        .game()
        .start_index
        .context("round started without a start tile")?;
    info!(start_index, round = ?vision.round_length(), "remember this tile");

    // the round is over once its last timer has fired
    vision.event_loop().run_to_completion().await;

    let tiles = vision.config().tile_count();
    let pick = cli.pick.unwrap_or(start_index);
    ensure!(pick < tiles, "--pick must be below {tiles}, got {pick}");
    vision.pick(pick)?;
    vision.event_loop().run_to_completion().await;

    if let Some(err) = vision.app().take_render_error() {
        bail!("render failed: {err}");
    }

    println!("{}", vision.markup());
    println!();
    println!("start tile: {start_index}, picked: {pick}");
    match outcome.get() {
        Some(true) => println!("You Win !"),
        Some(false) => println!("Game Over"),
        None => bail!("the round ended without an outcome"),
    }
    Ok(())
}
