//! Board views.

use crate::actions::PICK_TILE;
use crate::state::{GameState, Status};
use std::rc::Rc;
use tracing::warn;
use vision_ui::{children, h, Actions, Handler, Props, VNode};

/// One board tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Slot in the position list; doubles as the reconciliation key.
    pub key: usize,
    pub size: f64,
    pub x: usize,
    pub y: usize,
    pub extra_class: Option<String>,
    pub transition: String,
}

pub fn tile(tile: &Tile, on_pick: Rc<dyn Fn(usize)>) -> VNode {
    let class = match tile.extra_class.as_deref() {
        Some(extra) if !extra.is_empty() => format!("tile {extra}"),
        _ => "tile".to_string(),
    };
    let px = |n: f64| format!("{n}px");
    let key = tile.key;
    h(
        "div",
        Props::new()
            .key(key)
            .attr("class", class)
            .style([
                ("left", px(tile.x as f64 * tile.size)),
                ("top", px(tile.y as f64 * tile.size)),
                ("width", px(tile.size)),
                ("height", px(tile.size)),
                ("transition", tile.transition.clone()),
            ])
            .on("click", move |_| on_pick(key)),
        (),
    )
}

/// The square board holding one tile per position slot.
pub fn tile_container(game: &GameState, actions: &Actions, transition: &str) -> VNode {
    let size = game.size.max(1);
    let tile_size = game.tile_size();
    let reveal = game.status.reveals_start();

    let pick = actions.get(PICK_TILE).cloned();
    let on_pick: Rc<dyn Fn(usize)> = Rc::new(move |index: usize| {
        let Some(pick) = &pick else { return };
        if let Err(err) = pick.call(index) {
            warn!(error = %err, index, "pick failed");
        }
    });

    let tiles = game
        .position
        .iter()
        .enumerate()
        .map(|(key, &value)| {
            let extra_class = (reveal && Some(key) == game.start_index).then(|| game.start_class_name.clone());
            tile(
                &Tile {
                    key,
                    size: tile_size,
                    x: value % size,
                    y: value / size,
                    extra_class,
                    transition: transition.to_string(),
                },
                Rc::clone(&on_pick),
            )
        })
        .collect::<Vec<_>>();

    h(
        "div",
        Props::new()
            .attr("class", "tile-container")
            .style([("height", format!("{}px", game.container_width))]),
        tiles,
    )
}

/// Labels and the start callback shared by the two round buttons.
#[derive(Clone)]
pub struct Controls {
    pub start_text: String,
    pub retry_text: String,
    pub transition: String,
    pub on_start: Handler,
}

fn button(visible: bool, label: &str, on_start: &Handler) -> VNode {
    h(
        "div",
        Props::new()
            .style([("display", if visible { "block" } else { "none" })])
            .on_shared("click", Rc::clone(on_start)),
        label,
    )
}

/// Whole game: the board plus the start and retry buttons.
pub fn game_view(game: &GameState, actions: &Actions, controls: &Controls) -> VNode {
    h(
        "div",
        Props::new().attr("class", "game-container"),
        children![
            tile_container(game, actions, &controls.transition),
            button(game.status == Status::Init, &controls.start_text, &controls.on_start),
            button(game.status == Status::Over, &controls.retry_text, &controls.on_start),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(extra: Option<&str>) -> Tile {
        Tile {
            key: 3,
            size: 80.0,
            x: 1,
            y: 2,
            extra_class: extra.map(String::from),
            transition: "left 0.8s, top 0.8s".into(),
        }
    }

    #[test]
    fn tile_position_and_size() {
        let node = tile(&sample(None), Rc::new(|_: usize| {}));
        let props = node.props().unwrap();

        assert_eq!(node.key(), Some(&vision_ui::Key::Int(3)));
        assert_eq!(props.get("class").and_then(|v| v.as_str()), Some("tile"));
        let vision_ui::PropValue::Style(style) = props.get("style").unwrap() else {
            panic!("style is not a map");
        };
        assert_eq!(style["left"], "80px");
        assert_eq!(style["top"], "160px");
        assert_eq!(style["width"], "80px");
    }

    #[test]
    fn extra_class_is_appended() {
        let node = tile(&sample(Some("my-icon")), Rc::new(|_: usize| {}));
        assert_eq!(
            node.props().unwrap().get("class").and_then(|v| v.as_str()),
            Some("tile my-icon")
        );

        let node = tile(&sample(Some("")), Rc::new(|_: usize| {}));
        assert_eq!(node.props().unwrap().get("class").and_then(|v| v.as_str()), Some("tile"));
    }

    #[test]
    fn fractional_tile_sizes_keep_precision() {
        let tile_node = tile(
            &Tile {
                size: 100.0 / 3.0,
                ..sample(None)
            },
            Rc::new(|_: usize| {}),
        );
        let vision_ui::PropValue::Style(style) = tile_node.props().unwrap().get("style").unwrap() else {
            panic!("style is not a map");
        };
        assert_eq!(style["width"], "33.333333333333336px");
    }
}
