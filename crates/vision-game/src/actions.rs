//! Game actions.
//!
//! All actions are thunks so they always see the state committed by the
//! previous call. Randomness comes from a shared [`StdRng`] so a seeded
//! board plays the same round every time.

use crate::state::{GameState, Status, IS_WIN, POSITION, START_INDEX, STATUS};
use rand::rngs::StdRng;
use rand::Rng;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;
use vision_ui::{state, ActionError, ActionTree, EventLoop, StateMap, Update, Value};

pub const INIT_TILE_POSITION: &str = "init_tile_position";
pub const RANDOM_TILE_POSITION: &str = "random_tile_position";
pub const START_GAME: &str = "start_game";
pub const START_MOVING: &str = "start_moving";
pub const STOP_MOVING: &str = "stop_moving";
pub const PICK_TILE: &str = "pick_tile";

/// Delay between a pick and the game-over callback.
pub const GAME_OVER_DELAY: Duration = Duration::from_millis(50);

/// Called with `true` when the pick found the start tile.
pub type GameOverHook = Rc<dyn Fn(bool)>;

/// What the actions share.
#[derive(Clone)]
pub struct GameContext {
    pub rng: Rc<RefCell<StdRng>>,
    pub event_loop: Rc<EventLoop>,
    pub on_game_over: Option<GameOverHook>,
}

/// Swaps `items[index]` with an item at a different random index.
pub fn random_swap<T>(items: &mut [T], index: usize, rng: &mut impl Rng) {
    let len = items.len();
    if len < 2 || index >= len {
        return;
    }
    let mut other = index;
    while other == index {
        other = rng.random_range(0..len);
    }
    items.swap(index, other);
    debug!(index, other, "swap");
}

/// Returns a shuffled copy of `position`; the input is left untouched.
///
/// Performs `count` random swaps (`count == 0` means one per tile) and then
/// one more swap of the start tile, if any.
pub fn shuffle(position: &[usize], count: usize, start_index: Option<usize>, rng: &mut impl Rng) -> Vec<usize> {
    let mut next = position.to_vec();
    if next.len() < 2 {
        return next;
    }
    let count = if count == 0 { next.len() } else { count };
    for _ in 0..count {
        let index = rng.random_range(0..next.len());
        random_swap(&mut next, index, rng);
    }
    if let Some(start) = start_index {
        random_swap(&mut next, start, rng);
    }
    next
}

fn parse_index(action: &str, payload: &Value) -> Result<Option<usize>, ActionError> {
    if payload.is_null() {
        return Ok(None);
    }
    payload
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| ActionError::InvalidPayload {
            action: action.to_string(),
            reason: format!("expected a non-negative integer, got {payload:?}"),
        })
}

fn list(position: Vec<usize>) -> Value {
    Value::from(position)
}

/// Builds the game's action tree.
pub fn game_actions(ctx: GameContext) -> ActionTree {
    let shuffle_rng = Rc::clone(&ctx.rng);
    let start_rng = Rc::clone(&ctx.rng);
    let pick_ctx = ctx;

    ActionTree::new()
        .action(INIT_TILE_POSITION, |_| {
            Ok(Update::thunk(|s, _| {
                let game = GameState::read(s);
                let position: Vec<usize> = (0..game.size * game.size).collect();
                Ok(state! { POSITION => list(position) }.into())
            }))
        })
        .action(RANDOM_TILE_POSITION, move |payload| {
            let count = parse_index(RANDOM_TILE_POSITION, &payload)?.unwrap_or(0);
            let rng = Rc::clone(&shuffle_rng);
            Ok(Update::thunk(move |s, _| {
                let game = GameState::read(s);
                let next = shuffle(&game.position, count, game.start_index, &mut *rng.borrow_mut());
                debug!(position = ?next, "random tile position");
                Ok(state! { POSITION => list(next) }.into())
            }))
        })
        .action(START_GAME, move |_| {
            let rng = Rc::clone(&start_rng);
            Ok(Update::thunk(move |s, _| {
                let game = GameState::read(s);
                if !game.status.can_start() {
                    return Ok(StateMap::new().into());
                }
                let tiles = (game.size * game.size).max(1);
                let start_index = rng.borrow_mut().random_range(0..tiles);
                Ok(state! { STATUS => Status::Start, START_INDEX => start_index }.into())
            }))
        })
        .action(START_MOVING, |_| Ok(Update::thunk(|_, _| Ok(state! { STATUS => Status::Moving }.into()))))
        .action(STOP_MOVING, |_| Ok(Update::thunk(|_, _| Ok(state! { STATUS => Status::Waiting }.into()))))
        .action(PICK_TILE, move |payload| {
            let picked = parse_index(PICK_TILE, &payload)?;
            let ctx = pick_ctx.clone();
            Ok(Update::thunk(move |s, _| {
                let game = GameState::read(s);
                if game.status != Status::Waiting {
                    return Ok(StateMap::new().into());
                }
                let is_win = picked.is_some() && picked == game.start_index;
                if let Some(hook) = &ctx.on_game_over {
                    let hook = Rc::clone(hook);
                    ctx.event_loop.schedule(GAME_OVER_DELAY, move || hook(is_win));
                }
                debug!(?picked, is_win, "tile picked");
                Ok(state! { IS_WIN => is_win, STATUS => Status::Over }.into())
            }))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::state::initial_state;
    use rand::SeedableRng;
    use std::cell::Cell;
    use vision_ui::{h, App, Props};

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn random_swap_never_swaps_in_place() {
        let mut rng = rng(1);
        for index in 0..4 {
            let mut items = [0, 1, 2, 3];
            random_swap(&mut items, index, &mut rng);
            assert_ne!(items[index], index);
        }
    }

    #[test]
    fn shuffle_once_changes_exactly_two_slots() {
        let position = vec![0, 1, 2, 3];
        for seed in 0..20 {
            let next = shuffle(&position, 1, None, &mut rng(seed));

            assert_eq!(position, [0, 1, 2, 3]);
            let changed = position.iter().zip(&next).filter(|(a, b)| a != b).count();
            assert_eq!(changed, 2);
            let mut sorted = next.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, position);
        }
    }

    #[test]
    fn shuffle_of_tiny_boards_is_identity() {
        assert_eq!(shuffle(&[0], 3, Some(0), &mut rng(2)), [0]);
        assert!(shuffle(&[], 3, None, &mut rng(2)).is_empty());
    }

    async fn headless(state: StateMap, on_game_over: Option<GameOverHook>) -> App<vision_ui::MemorySurface> {
        let event_loop = Rc::new(EventLoop::new());
        let ctx = GameContext {
            rng: Rc::new(RefCell::new(rng(9))),
            event_loop: Rc::clone(&event_loop),
            on_game_over,
        };
        let app = App::headless(state, game_actions(ctx), |_, _| h("div", Props::new(), ()), event_loop).unwrap();
        app.event_loop().settle().await;
        app
    }

    #[tokio::test]
    async fn init_tile_position_fills_the_board() {
        let config = GameConfig {
            size: 3,
            container_width: 90.0,
            ..GameConfig::default()
        };
        let app = headless(initial_state(&config), None).await;

        app.actions().call(INIT_TILE_POSITION, ()).unwrap();

        assert_eq!(GameState::read(&app.state()).position, (0..9).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn start_game_picks_a_start_tile_only_when_startable() {
        let app = headless(state! { "size" => 2, "status" => "moving" }, None).await;
        app.actions().call(START_GAME, ()).unwrap();
        assert_eq!(GameState::read(&app.state()).start_index, None);

        let app = headless(state! { "size" => 2, "status" => "over" }, None).await;
        app.actions().call(START_GAME, ()).unwrap();
        let game = GameState::read(&app.state());
        assert_eq!(game.status, Status::Start);
        assert!(game.start_index.is_some_and(|i| i < 4));
    }

    #[tokio::test(start_paused = true)]
    async fn pick_reports_the_outcome_after_a_delay() {
        let outcome = Rc::new(Cell::new(None));
        let sink = Rc::clone(&outcome);
        let app = headless(
            state! { "size" => 2, "status" => "waiting", "start_index" => 2 },
            Some(Rc::new(move |win: bool| sink.set(Some(win)))),
        )
        .await;

        app.actions().call(PICK_TILE, 2).unwrap();
        assert_eq!(GameState::read(&app.state()).status, Status::Over);
        assert_eq!(GameState::read(&app.state()).is_win, Some(true));
        assert_eq!(outcome.get(), None);

        app.event_loop().run_for(Duration::from_millis(49)).await;
        assert_eq!(outcome.get(), None);
        app.event_loop().run_for(Duration::from_millis(1)).await;
        assert_eq!(outcome.get(), Some(true));
    }

    #[tokio::test]
    async fn bad_payload_is_rejected_before_touching_state() {
        let app = headless(state! { "status" => "waiting" }, None).await;
        let before = app.state();

        let err = app.actions().call(PICK_TILE, "third").unwrap_err();

        assert!(matches!(err, ActionError::InvalidPayload { action, .. } if action == PICK_TILE));
        assert!(app.state().ptr_eq(&before));
    }
}
