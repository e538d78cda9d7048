//! # vision-ui
//!
//! A minimal reactive UI runtime in the hyperscript style.
//!
//! - [`h`] builds immutable [`VNode`] trees.
//! - [`app`] wires an [`ActionTree`] against a [`StateMap`], renders the
//!   view, and re-renders (coalesced per event-loop turn) whenever an action
//!   commits a change.
//! - [`Reconciler`] applies tree differences to any [`Surface`], keeping
//!   keyed children's identity and running lifecycle hooks.
//! - [`EventLoop`] runs deferred renders and timers as tokio local tasks.
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! use std::rc::Rc;
//! use vision_ui::{app, h, state, text, ActionTree, EventLoop, MemorySurface, Mount, Props, Value};
//!
//! let (surface, body) = MemorySurface::with_container("body");
//! let actions = ActionTree::new().action("bump", |_| {
//!     Ok(vision_ui::Update::thunk(|s, _| {
//!         let n = s.get("n").and_then(Value::as_i64).unwrap_or(0);
//!         Ok(state! { "n" => n + 1 }.into())
//!     }))
//! });
//! let running = app(
//!     state! { "n" => 0 },
//!     actions,
//!     |s, _| h("p", Props::new(), text(s.get("n").and_then(Value::as_i64).unwrap_or(0))),
//!     Some(Mount::new(surface, body)),
//!     Rc::new(EventLoop::new()),
//! )
//! .unwrap();
//!
//! running.actions().call("bump", ()).unwrap();
//! running.event_loop().settle().await;
//! assert_eq!(running.with_surface(|s| s.text_content(body)).unwrap(), "1");
//! # });
//! ```

pub mod action;
pub mod app;
pub mod event_loop;
pub mod memory;
pub mod node;
pub mod props;
pub mod reconcile;
pub mod surface;
pub mod value;

// Strategies for property tests, behind the test-utils feature
#[cfg(feature = "test-utils")]
pub mod proptest_strategies;

pub use action::{wire, ActionError, ActionTree, Actions, Deferred, StateHost, Update, WiredAction};
pub use app::{app, App, AppError, Mount, RenderError};
pub use event_loop::EventLoop;
pub use memory::{MemorySurface, Mutation};
pub use node::{component, h, text, Child, Element, VNode};
pub use props::{CreateHook, DestroyHook, Event, Handler, Hooks, Key, PropValue, Props, RemoveHook, StyleMap, UpdateHook};
pub use reconcile::{Done, PatchStats, ReconcileError, Reconciler};
pub use surface::{adopt, Capabilities, ElementId, Namespace, Surface, SurfaceError, SurfaceNode};
pub use value::{StateMap, Value};
