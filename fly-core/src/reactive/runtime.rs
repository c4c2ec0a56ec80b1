//! Reactive Runtime
//!
//! The runtime is the per-thread coordinator that connects cells, effects
//! and the scheduler. It owns every live effect, keyed by subscriber id, so
//! that cells only need to remember ids.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers here and is enqueued for its
//!    initial run.
//! 2. When a cell's value changes, every subscriber id it holds is enqueued.
//! 3. When the host calls [`tick`], the scheduler runs the pending effects
//!    in order. Ids whose effect has been disposed are skipped.
//!
//! # Threading
//!
//! All of this state is thread-local. Handles are `Rc`-based and cannot
//! cross threads, so each thread that uses Fly has an independent runtime
//! and at most one subscriber body is executing on it at any time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::context::ReactiveContext;
use super::effect::EffectNode;
use super::scheduler::Scheduler;
use super::subscriber::SubscriberId;
use crate::config::RuntimeConfig;
use crate::error::ReactiveError;

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// The per-thread reactive runtime.
pub(crate) struct Runtime {
    config: RefCell<RuntimeConfig>,
    effects: RefCell<HashMap<SubscriberId, Rc<EffectNode>>>,
    scheduler: Scheduler,
}

impl Runtime {
    fn new() -> Self {
        Self {
            config: RefCell::new(RuntimeConfig::default()),
            effects: RefCell::new(HashMap::new()),
            scheduler: Scheduler::new(),
        }
    }

    pub(crate) fn with<R>(f: impl FnOnce(&Runtime) -> R) -> R {
        RUNTIME.with(f)
    }

    /// Like [`Runtime::with`], but returns `None` while the thread is
    /// shutting down and its runtime has already been destroyed.
    pub(crate) fn try_with<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
        RUNTIME.try_with(f).ok()
    }

    /// Take ownership of a new effect and enqueue its initial run.
    pub(crate) fn register(&self, effect: Rc<EffectNode>) {
        let id = effect.id();
        self.effects.borrow_mut().insert(id, effect);
        self.scheduler.enqueue(id);
    }

    /// Enqueue every subscriber of a changed cell.
    pub(crate) fn schedule(&self, subscribers: &[SubscriberId]) {
        for subscriber in subscribers {
            self.scheduler.enqueue(*subscriber);
        }
    }

    /// Forget an effect: cancel its pending run and drop its subscriptions.
    ///
    /// Returns `false` if the effect was already disposed.
    pub(crate) fn dispose(&self, id: SubscriberId) -> bool {
        let effect = self.effects.borrow_mut().remove(&id);
        self.scheduler.cancel(id);

        match effect {
            Some(effect) => {
                effect.dispose();
                debug!(subscriber = ?id, "effect disposed");
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_live(&self, id: SubscriberId) -> bool {
        self.effects.borrow().contains_key(&id)
    }

    pub(crate) fn effect(&self, id: SubscriberId) -> Option<Rc<EffectNode>> {
        self.effects.borrow().get(&id).cloned()
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, id: SubscriberId) -> bool {
        self.scheduler.is_pending(id)
    }

    fn run(&self, id: SubscriberId) {
        if let Some(effect) = self.effect(id) {
            effect.run();
        }
    }

    fn flush(&self) -> Result<usize, ReactiveError> {
        let limit = self.config.borrow().max_flush_runs;
        self.scheduler.flush(limit, |id| self.run(id))
    }
}

/// Run the scheduled flush, if any, and return how many subscriber runs it
/// executed.
///
/// Writes never run subscribers synchronously; they only schedule a flush.
/// `tick` is the yield point at which that flush happens, so any number of
/// writes made before it are coalesced into a single pass. Calling `tick`
/// from inside a running effect is a no-op.
///
/// A panic inside a subscriber propagates out of `tick`. Subscribers that
/// had not run yet in that pass are dropped, and the scheduler is left ready
/// for the next write.
pub fn tick() -> Result<usize, ReactiveError> {
    Runtime::with(Runtime::flush)
}

/// Whether a flush is scheduled and waiting for [`tick`].
pub fn has_pending() -> bool {
    Runtime::with(|rt| rt.scheduler.is_scheduled() && !rt.scheduler.is_flushing())
}

/// Replace this thread's runtime configuration.
pub fn configure(config: RuntimeConfig) {
    Runtime::with(|rt| *rt.config.borrow_mut() = config);
}

/// The current runtime configuration of this thread.
pub fn config() -> RuntimeConfig {
    Runtime::with(|rt| rt.config.borrow().clone())
}

/// Run `f` without registering any cell it reads as a dependency of the
/// currently running effect.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}

/// Yield to the async executor, then flush until nothing is pending.
///
/// Intended for hosts running on a current-thread tokio runtime, where the
/// yield plays the role of a microtask boundary.
#[cfg(feature = "tokio")]
pub async fn settle() -> Result<usize, ReactiveError> {
    let mut runs = 0;
    loop {
        tokio::task::yield_now().await;
        runs += tick()?;
        if !has_pending() {
            return Ok(runs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_effect, create_signal};
    use std::cell::Cell;

    #[test]
    fn tick_without_work_does_nothing() {
        assert_eq!(tick(), Ok(0));
        assert!(!has_pending());
    }

    #[test]
    fn effects_are_owned_until_disposed() {
        let disposer = create_effect(|| {});
        let id = disposer.id();

        Runtime::with(|rt| {
            assert!(rt.is_live(id));
            assert!(rt.is_pending(id));
        });

        assert!(Runtime::with(|rt| rt.dispose(id)));
        assert!(!Runtime::with(|rt| rt.dispose(id)));
        Runtime::with(|rt| {
            assert!(!rt.is_live(id));
            assert!(!rt.is_pending(id));
        });
    }

    #[test]
    fn configured_limit_stops_runaway_effects() {
        configure(RuntimeConfig { max_flush_runs: 10 });

        let count = create_signal(0);
        let runaway = count.clone();
        let _effect = create_effect(move || runaway.set(runaway.get() + 1));

        assert_eq!(tick(), Err(ReactiveError::FlushLimitExceeded { limit: 10 }));
        assert!(!has_pending());
        assert_eq!(count.get(), 10);

        configure(RuntimeConfig::default());
    }

    #[test]
    fn untrack_prevents_subscription() {
        let source = create_signal(1);
        let runs = Rc::new(Cell::new(0));

        let (s, r) = (source.clone(), runs.clone());
        let _effect = create_effect(move || {
            r.set(r.get() + 1);
            untrack(|| s.get());
        });

        tick().unwrap();
        source.set(2);
        tick().unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(source.subscriber_count(), 0);
    }
}
