//! Single-threaded task scheduling on tokio.
//!
//! Deferred renders, timers and late removal completions are spawned as
//! local tasks onto a [`LocalSet`] owned by the loop. They only make progress
//! while the host drives the loop from a current-thread runtime through
//! [`EventLoop::run_until`], [`EventLoop::settle`], [`EventLoop::run_for`] or
//! [`EventLoop::run_to_completion`]. Under a paused tokio clock timers fire in
//! deadline order without any real waiting.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tokio::time::Instant;
use tracing::trace;

/// When each unfinished task becomes runnable.
#[derive(Default)]
struct Ledger {
    next_id: Cell<u64>,
    due: RefCell<BTreeMap<u64, Instant>>,
}

impl Ledger {
    fn open(self: &Rc<Self>, at: Instant) -> Entry {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.due.borrow_mut().insert(id, at);
        Entry {
            id,
            ledger: Rc::clone(self),
        }
    }

    fn has_due(&self, now: Instant) -> bool {
        self.due.borrow().values().any(|at| *at <= now)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.due.borrow().values().min().copied()
    }
}

/// Struck from the ledger when its task finishes or is dropped.
struct Entry {
    id: u64,
    ledger: Rc<Ledger>,
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.ledger.due.borrow_mut().remove(&self.id);
    }
}

pub struct EventLoop {
    tasks: LocalSet,
    ledger: Rc<Ledger>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            tasks: LocalSet::new(),
            ledger: Rc::default(),
        }
    }

    /// Queues `task` for the next turn.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        let entry = self.ledger.open(Instant::now());
        self.tasks.spawn_local(async move {
            let _entry = entry;
            task();
        });
    }

    /// Queues `task` to run once `delay` has passed.
    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + 'static) {
        let at = Instant::now() + delay;
        let entry = self.ledger.open(at);
        self.tasks.spawn_local(async move {
            let _entry = entry;
            tokio::time::sleep_until(at).await;
            task();
        });
    }

    /// Tasks spawned and not yet finished, timers included.
    pub fn pending(&self) -> usize {
        self.ledger.due.borrow().len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.ledger.next_deadline()
    }

    /// Polls `future` to completion while running the loop's tasks.
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        self.tasks.run_until(future).await
    }

    /// Runs every task that is already due, and whatever those tasks defer.
    /// The clock is not moved.
    pub async fn settle(&self) {
        self.run_until(self.drain()).await;
    }

    /// Lets `by` pass, running timers as they come due, then settles.
    pub async fn run_for(&self, by: Duration) {
        self.run_until(async {
            tokio::time::sleep(by).await;
            self.drain().await;
        })
        .await;
    }

    /// Runs until no task is left, waiting out every timer.
    pub async fn run_to_completion(&self) {
        self.run_until(async {
            self.drain().await;
            while let Some(at) = self.next_deadline() {
                tokio::time::sleep_until(at).await;
                self.drain().await;
            }
        })
        .await;
    }

    // Always yields once: a timer sharing the caller's deadline is woken but
    // has not run yet.
    async fn drain(&self) {
        let mut turns = 0u32;
        loop {
            tokio::task::yield_now().await;
            turns += 1;
            if !self.ledger.has_due(Instant::now()) {
                break;
            }
        }
        trace!(turns, pending = self.pending(), "event loop settled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let make = move |name: &'static str| -> Box<dyn FnOnce()> {
            let sink = Rc::clone(&sink);
            Box::new(move || sink.borrow_mut().push(name))
        };
        (log, make)
    }

    #[tokio::test]
    async fn deferred_tasks_run_in_fifo_order() {
        let event_loop = EventLoop::new();
        let (log, task) = recorder();

        event_loop.defer(task("a"));
        event_loop.defer(task("b"));
        event_loop.defer(task("c"));
        assert_eq!(event_loop.pending(), 3);
        assert!(log.borrow().is_empty());

        event_loop.settle().await;

        assert_eq!(*log.borrow(), ["a", "b", "c"]);
        assert_eq!(event_loop.pending(), 0);
    }

    #[tokio::test]
    async fn settle_runs_tasks_deferred_by_tasks() {
        let event_loop = Rc::new(EventLoop::new());
        let (log, task) = recorder();

        let inner = Rc::clone(&event_loop);
        let late = task("late");
        let first = task("first");
        event_loop.defer(move || {
            first();
            inner.defer(late);
        });

        event_loop.settle().await;
        assert_eq!(*log.borrow(), ["first", "late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_for_fires_timers_by_deadline() {
        let event_loop = EventLoop::new();
        let (log, task) = recorder();

        event_loop.schedule(Duration::from_millis(30), task("30"));
        event_loop.schedule(Duration::from_millis(10), task("10"));
        event_loop.schedule(Duration::from_millis(20), task("20"));
        event_loop.schedule(Duration::from_millis(50), task("50"));
        let started = Instant::now();

        event_loop.run_for(Duration::from_millis(40)).await;

        assert_eq!(*log.borrow(), ["10", "20", "30"]);
        assert_eq!(event_loop.pending(), 1);
        assert_eq!(event_loop.next_deadline(), Some(started + Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn timers_scheduled_by_timers_fire_within_the_window() {
        let event_loop = Rc::new(EventLoop::new());
        let (log, task) = recorder();

        let inner = Rc::clone(&event_loop);
        let chained = task("chained");
        event_loop.schedule(Duration::from_millis(10), move || {
            inner.schedule(Duration::from_millis(10), chained);
        });

        event_loop.run_for(Duration::from_millis(15)).await;
        assert!(log.borrow().is_empty());

        event_loop.run_for(Duration::from_millis(10)).await;
        assert_eq!(*log.borrow(), ["chained"]);
    }

    #[tokio::test(start_paused = true)]
    async fn a_timer_due_exactly_at_the_end_of_the_window_runs() {
        let event_loop = EventLoop::new();
        let (log, task) = recorder();

        event_loop.schedule(Duration::from_millis(800), task("edge"));
        event_loop.run_for(Duration::from_millis(800)).await;

        assert_eq!(*log.borrow(), ["edge"]);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_leaves_future_timers_for_run_to_completion() {
        let event_loop = EventLoop::new();
        let (log, task) = recorder();

        event_loop.defer(task("now"));
        event_loop.schedule(Duration::from_secs(1), task("later"));
        let started = Instant::now();

        event_loop.settle().await;
        assert_eq!(*log.borrow(), ["now"]);
        assert_eq!(event_loop.pending(), 1);
        assert_eq!(Instant::now(), started);

        event_loop.run_to_completion().await;
        assert_eq!(*log.borrow(), ["now", "later"]);
        assert_eq!(event_loop.pending(), 0);
        assert!(Instant::now() >= started + Duration::from_secs(1));
    }
}
