//! The running app: wiring, render scheduling and patching.
//!
//! State changes committed by wired actions mark a render as pending and
//! defer one render task to the [`EventLoop`]. Any number of commits before
//! that task runs are coalesced into a single view call and patch.
//!
//! Lifecycle hooks queued by the patch run after it, with the surface
//! released, so an `onremove` hook can style its leaving element through
//! [`App::with_surface_mut`] before calling its continuation.

use crate::action::{prepare_state, state_at, wire_actions, ActionError, ActionTree, Actions, StateHost};
use crate::event_loop::EventLoop;
use crate::memory::MemorySurface;
use crate::node::VNode;
use crate::props::Event;
use crate::reconcile::{PatchStats, ReconcileError, Reconciler};
use crate::surface::{adopt, ElementId, Surface, SurfaceError, SurfaceNode};
use crate::value::StateMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::{debug, error, trace};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("container {0} is not an element")]
    InvalidContainer(ElementId),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Where an app renders: a surface and the element its root lives under.
pub struct Mount<S> {
    pub surface: S,
    pub container: ElementId,
}

impl<S> Mount<S> {
    pub fn new(surface: S, container: ElementId) -> Self {
        Self { surface, container }
    }
}

type ViewFn = Box<dyn Fn(&StateMap, &Actions) -> VNode>;

struct Store {
    state: StateMap,
    pending: bool,
    rendering: bool,
    passes: u64,
    last_error: Option<RenderError>,
}

struct Renderer<S> {
    mount: Option<Mount<S>>,
    root: Option<ElementId>,
    last: Option<VNode>,
    reconciler: Reconciler,
}

struct AppInner<S: Surface + 'static> {
    // store and renderer are separate so actions fired from hooks during a
    // patch never touch the renderer borrow
    store: RefCell<Store>,
    renderer: RefCell<Renderer<S>>,
    view: ViewFn,
    actions: Actions,
    event_loop: Rc<EventLoop>,
    me: Weak<AppInner<S>>,
}

/// Handle to a running app. Cloning is cheap.
pub struct App<S: Surface + 'static> {
    inner: Rc<AppInner<S>>,
}

impl<S: Surface + 'static> Clone for App<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: Surface + 'static> fmt::Debug for App<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.inner.store.borrow();
        f.debug_struct("App")
            .field("state", &store.state)
            .field("pending", &store.pending)
            .field("passes", &store.passes)
            .finish_non_exhaustive()
    }
}

/// Starts an app.
///
/// Wires `actions` against `state`, adopts the first element already inside
/// the mount's container (so the first patch reuses it), and schedules the
/// initial render on `event_loop`. Without a mount the view still runs on
/// every render but nothing is patched.
pub fn app<S, V>(
    state: StateMap,
    actions: ActionTree,
    view: V,
    mount: Option<Mount<S>>,
    event_loop: Rc<EventLoop>,
) -> Result<App<S>, AppError>
where
    S: Surface + 'static,
    V: Fn(&StateMap, &Actions) -> VNode + 'static,
{
    let state = prepare_state(state, &actions, &[])?;

    let mut root = None;
    let mut last = None;
    if let Some(mount) = &mount {
        if !matches!(mount.surface.describe(mount.container)?, SurfaceNode::Element { .. }) {
            return Err(AppError::InvalidContainer(mount.container));
        }
        for child in mount.surface.children(mount.container)? {
            if let SurfaceNode::Element { .. } = mount.surface.describe(child)? {
                last = Some(adopt(&mount.surface, child)?);
                root = Some(child);
                debug!(%child, "adopted existing root element");
                break;
            }
        }
    }

    let inner = Rc::new_cyclic(|me: &Weak<AppInner<S>>| {
        let host: Weak<dyn StateHost> = me.clone();
        AppInner {
            store: RefCell::new(Store {
                state,
                pending: false,
                rendering: false,
                passes: 0,
                last_error: None,
            }),
            renderer: RefCell::new(Renderer {
                mount,
                root,
                last,
                reconciler: Reconciler::new(),
            }),
            view: Box::new(view),
            actions: wire_actions(actions, &host),
            event_loop,
            me: me.clone(),
        }
    });

    let me = Rc::downgrade(&inner);
    inner.renderer.borrow().reconciler.set_removal_waker(move || {
        let Some(inner) = me.upgrade() else { return };
        let target = Rc::downgrade(&inner);
        inner.event_loop.defer(move || {
            if let Some(inner) = target.upgrade() {
                if let Err(err) = inner.flush_removals() {
                    inner.fail(err);
                }
            }
        });
    });

    inner.schedule_render();
    Ok(App { inner })
}

impl<S: Surface + 'static> StateHost for AppInner<S> {
    fn sub_state(&self, path: &[String]) -> Result<StateMap, ActionError> {
        state_at(&self.store.borrow().state, path)
    }

    fn commit(&self, path: &[String], patch: &StateMap) -> Result<bool, ActionError> {
        {
            let mut store = self.store.borrow_mut();
            let current = state_at(&store.state, path)?;
            let merged = current.merge(patch);
            if merged.ptr_eq(&current) {
                return Ok(false);
            }
            store.state = store.state.set_path(path, merged);
        }
        self.schedule_render();
        Ok(true)
    }
}

impl<S: Surface + 'static> AppInner<S> {
    fn schedule_render(&self) {
        {
            let mut store = self.store.borrow_mut();
            if store.pending {
                return;
            }
            store.pending = true;
        }
        let me = self.me.clone();
        self.event_loop.defer(move || {
            if let Some(inner) = me.upgrade() {
                if let Err(err) = inner.render() {
                    inner.fail(err);
                }
            }
        });
    }

    fn fail(&self, err: RenderError) {
        error!(error = %err, "render pass failed");
        self.store.borrow_mut().last_error = Some(err);
    }

    fn render(&self) -> Result<PatchStats, RenderError> {
        let (state, pass) = {
            let mut store = self.store.borrow_mut();
            if !store.pending {
                return Ok(PatchStats::default());
            }
            if store.rendering {
                drop(store);
                trace!("render requested mid-pass, leaving the diff to the queued pass");
                self.drain_lifecycle()?;
                return Ok(PatchStats::default());
            }
            store.pending = false;
            store.rendering = true;
            store.passes += 1;
            (store.state.clone(), store.passes)
        };

        let next = (self.view)(&state, &self.actions);

        let rescheduled = self.store.borrow().pending;
        let outcome = if rescheduled {
            debug!(pass, "state changed while rendering, skipping diff");
            Ok(PatchStats::default())
        } else {
            self.apply(next, pass)
        };

        self.store.borrow_mut().rendering = false;
        let drained = self.drain_lifecycle();
        let stats = outcome?;
        drained?;
        Ok(stats)
    }

    /// Runs the queued `oncreate`/`onupdate`/`onremove` calls with the
    /// surface released, then detaches removals they completed.
    fn drain_lifecycle(&self) -> Result<usize, RenderError> {
        // an ondestroy hook can get here while the patch still holds the renderer
        let Ok(mut renderer) = self.renderer.try_borrow_mut() else {
            return Ok(0);
        };
        let hooks = renderer.reconciler.take_lifecycle();
        drop(renderer);

        trace!(hooks = hooks.len(), "draining lifecycle hooks");
        for hook in hooks {
            hook();
        }
        self.flush_removals()
    }

    fn apply(&self, next: VNode, pass: u64) -> Result<PatchStats, RenderError> {
        let mut renderer = self.renderer.borrow_mut();
        let Renderer {
            mount,
            root,
            last,
            reconciler,
        } = &mut *renderer;

        let Some(mount) = mount else {
            *last = Some(next);
            return Ok(PatchStats::default());
        };

        let patched = reconciler.patch(&mut mount.surface, mount.container, *root, last.as_ref(), &next);
        let stats = reconciler.take_stats();
        let element = patched?;
        *root = Some(element);
        *last = Some(next);

        debug!(
            pass,
            created = stats.created,
            updated = stats.updated,
            moved = stats.moved,
            removed = stats.removed,
            "render pass applied"
        );
        Ok(stats)
    }

    fn flush_removals(&self) -> Result<usize, RenderError> {
        let mut renderer = self.renderer.borrow_mut();
        let Renderer {
            mount, reconciler, ..
        } = &mut *renderer;
        match mount {
            Some(mount) => Ok(reconciler.flush_removals(&mut mount.surface)?),
            None => Ok(0),
        }
    }
}

impl<S: Surface + 'static> App<S> {
    pub fn actions(&self) -> &Actions {
        &self.inner.actions
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> StateMap {
        self.inner.store.borrow().state.clone()
    }

    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.inner.event_loop
    }

    /// Number of times the view has been called.
    pub fn render_count(&self) -> u64 {
        self.inner.store.borrow().passes
    }

    pub fn is_render_pending(&self) -> bool {
        self.inner.store.borrow().pending
    }

    /// The element currently holding the rendered root.
    pub fn root(&self) -> Option<ElementId> {
        self.inner.renderer.borrow().root
    }

    /// Runs `f` with the surface, if the app is mounted.
    ///
    /// `oncreate`, `onupdate` and `onremove` hooks run once the patch has
    /// released the surface and may use this. `ondestroy` runs mid-patch and
    /// must not.
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        let renderer = self.inner.renderer.borrow();
        renderer.mount.as_ref().map(|mount| f(&mount.surface))
    }

    pub fn with_surface_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        let mut renderer = self.inner.renderer.borrow_mut();
        renderer.mount.as_mut().map(|mount| f(&mut mount.surface))
    }

    /// Delivers `event` to the listener on `element`.
    ///
    /// The listener runs with no borrow of the surface held, so it may call
    /// actions freely. Returns `false` when no listener is installed.
    pub fn dispatch(&self, element: ElementId, event: &str) -> bool {
        let handler = self
            .inner
            .renderer
            .borrow()
            .mount
            .as_ref()
            .and_then(|mount| mount.surface.listener(element, event));
        match handler {
            Some(handler) => {
                handler(&Event {
                    name: event.to_string(),
                    target: element,
                });
                true
            }
            None => false,
        }
    }

    /// The error of the last failed render pass run by the event loop.
    pub fn take_render_error(&self) -> Option<RenderError> {
        self.inner.store.borrow_mut().last_error.take()
    }

    /// Runs a pending render immediately instead of waiting for its task.
    ///
    /// Called from inside a view it only drains the lifecycle queue: the
    /// running pass skips its diff and the queued pass renders.
    pub fn render_now(&self) -> Result<PatchStats, RenderError> {
        self.inner.render()
    }

    /// Detaches removed subtrees whose `onremove` continuations completed.
    pub fn flush_removals(&self) -> Result<usize, RenderError> {
        self.inner.flush_removals()
    }

    pub fn pending_removals(&self) -> usize {
        self.inner.renderer.borrow().reconciler.pending_removals()
    }
}

impl App<MemorySurface> {
    /// An app with no surface: the view runs, nothing is patched.
    pub fn headless<V>(
        state: StateMap,
        actions: ActionTree,
        view: V,
        event_loop: Rc<EventLoop>,
    ) -> Result<Self, AppError>
    where
        V: Fn(&StateMap, &Actions) -> VNode + 'static,
    {
        app(state, actions, view, None, event_loop)
    }
}
