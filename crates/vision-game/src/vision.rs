//! The game controller: builds the app on a surface and drives a round on
//! the event loop's clock.

use crate::actions::{
    game_actions, GameContext, GameOverHook, INIT_TILE_POSITION, PICK_TILE, RANDOM_TILE_POSITION, START_GAME,
    START_MOVING, STOP_MOVING,
};
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::state::{initial_state, GameState, Status};
use crate::view::{game_view, Controls};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::{OnceCell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vision_ui::{app, ActionError, Actions, App, ElementId, Event, EventLoop, Handler, MemorySurface, Mount, Surface, SurfaceNode};

/// Timed sequence of a round: start, reveal, shuffle, wait.
struct Timeline {
    actions: OnceCell<Actions>,
    event_loop: Rc<EventLoop>,
    start_delay: Duration,
    move_interval: Duration,
    move_steps: u32,
}

impl Timeline {
    /// Hands over the app's actions. Only the first call takes effect.
    fn attach(&self, actions: Actions) {
        if self.actions.set(actions).is_err() {
            warn!("timeline already attached, keeping the first actions");
        }
    }

    fn call(&self, name: &str) -> Result<(), ActionError> {
        self.actions
            .get()
            .ok_or(ActionError::Detached)?
            .call(name, ())
            .map(drop)
    }

    /// Starts a round unless one is running. Returns whether it started.
    fn start(self: &Rc<Self>) -> Result<bool, ActionError> {
        let update = self
            .actions
            .get()
            .ok_or(ActionError::Detached)?
            .call(START_GAME, ())?;
        if update.as_patch().map_or(true, |patch| patch.is_empty()) {
            debug!("round already running");
            return Ok(false);
        }

        info!(steps = self.move_steps, "round started");
        let me = Rc::clone(self);
        self.event_loop.schedule(self.start_delay, move || me.begin_moving());
        Ok(true)
    }

    fn begin_moving(self: Rc<Self>) {
        if let Err(err) = self.call(START_MOVING) {
            error!(error = %err, "failed to start moving");
            return;
        }
        let me = Rc::clone(&self);
        self.event_loop.schedule(self.start_delay, move || {
            let steps = me.move_steps;
            me.step(steps);
        });
    }

    fn step(self: Rc<Self>, remaining: u32) {
        if remaining == 0 {
            if let Err(err) = self.call(STOP_MOVING) {
                error!(error = %err, "failed to stop moving");
            }
            return;
        }
        if let Err(err) = self.call(RANDOM_TILE_POSITION) {
            error!(error = %err, remaining, "shuffle failed");
            return;
        }
        let me = Rc::clone(&self);
        self.event_loop
            .schedule(self.move_interval, move || me.step(remaining - 1));
    }
}

/// A running board.
pub struct Vision<S: Surface + 'static> {
    config: GameConfig,
    app: App<S>,
    timeline: Rc<Timeline>,
}

impl<S: Surface + 'static> Vision<S> {
    /// Builds the board inside `mount`'s container and lays out the tiles.
    ///
    /// The first render is deferred to `event_loop` like any other.
    pub fn new(
        config: GameConfig,
        mount: Mount<S>,
        event_loop: Rc<EventLoop>,
        on_game_over: Option<GameOverHook>,
    ) -> GameResult<Self> {
        config.validate()?;
        if !matches!(mount.surface.describe(mount.container), Ok(SurfaceNode::Element { .. })) {
            return Err(GameError::MissingContainer(mount.container));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let tree = game_actions(GameContext {
            rng: Rc::new(RefCell::new(rng)),
            event_loop: Rc::clone(&event_loop),
            on_game_over,
        });

        let timeline = Rc::new(Timeline {
            actions: OnceCell::new(),
            event_loop: Rc::clone(&event_loop),
            start_delay: config.start_delay(),
            move_interval: config.move_interval(),
            move_steps: config.move_steps,
        });

        let starter = Rc::clone(&timeline);
        let on_start: Handler = Rc::new(move |_: &Event| {
            if let Err(err) = starter.start() {
                warn!(error = %err, "start failed");
            }
        });
        let controls = Controls {
            start_text: config.start_button_text.clone(),
            retry_text: config.retry_button_text.clone(),
            transition: config.tile_transition(),
            on_start,
        };

        let app = app(
            initial_state(&config),
            tree,
            move |s, actions| game_view(&GameState::read(s), actions, &controls),
            Some(mount),
            event_loop,
        )?;
        timeline.attach(app.actions().clone());
        app.actions().call(INIT_TILE_POSITION, ())?;

        debug!(size = config.size, seed = ?config.seed, "board ready");
        Ok(Self { config, app, timeline })
    }

    /// Starts a round. Returns `false` when one is already running.
    pub fn start(&self) -> GameResult<bool> {
        Ok(self.timeline.start()?)
    }

    /// Picks the tile in slot `index`. Returns whether the pick ended the
    /// round; picks outside the waiting phase are ignored.
    pub fn pick(&self, index: usize) -> GameResult<bool> {
        let update = self.app.actions().call(PICK_TILE, index)?;
        Ok(update.as_patch().is_some_and(|patch| !patch.is_empty()))
    }

    pub fn game(&self) -> GameState {
        GameState::read(&self.app.state())
    }

    pub fn status(&self) -> Status {
        self.game().status
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn app(&self) -> &App<S> {
        &self.app
    }

    pub fn event_loop(&self) -> &Rc<EventLoop> {
        self.app.event_loop()
    }

    /// Total time from `start` until the board waits for a pick.
    pub fn round_length(&self) -> Duration {
        self.config.start_delay() * 2 + self.config.move_interval() * self.config.move_steps
    }
}

impl Vision<MemorySurface> {
    /// Tile elements in slot order.
    pub fn tiles(&self) -> Vec<ElementId> {
        self.app
            .root()
            .and_then(|root| self.app.with_surface(|s| s.find_by_class(root, "tile")))
            .unwrap_or_default()
    }

    /// The start button, then the retry button.
    pub fn buttons(&self) -> Option<(ElementId, ElementId)> {
        let root = self.app.root()?;
        let children = self.app.with_surface(|s| s.children(root).ok())??;
        match children.as_slice() {
            [_, start, retry] => Some((*start, *retry)),
            _ => None,
        }
    }

    pub fn markup(&self) -> String {
        self.app
            .root()
            .and_then(|root| self.app.with_surface(|s| s.markup(root)))
            .unwrap_or_default()
    }
}
