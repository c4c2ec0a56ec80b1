//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a cell it
//! read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. Creating an effect does not run it. The effect is enqueued and its
//!    first run happens at the next flush.
//! 2. Each run executes inside a [`ReactiveContext`], so every cell the body
//!    reads subscribes this effect.
//! 3. After the run, the cells read this time are compared with the ones
//!    read last time, and the effect unsubscribes from cells it no longer
//!    reads. A subscription therefore lives exactly as long as the most recent
//!    run that exercised it.
//!
//! # Disposal
//!
//! [`Disposer::dispose`] cancels a pending run, unsubscribes the effect from
//! every cell it depends on and releases its body. Disposing twice is a
//! no-op.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{trace, warn};

use super::context::{ReactiveContext, TrackedSources};
use super::runtime::Runtime;
use super::subscriber::{Source, SourceId, SubscriberId};

/// The runtime-owned state of one effect.
pub(crate) struct EffectNode {
    id: SubscriberId,
    body: RefCell<Option<Box<dyn FnMut()>>>,
    sources: RefCell<TrackedSources>,
    disposed: Cell<bool>,
    runs: Cell<usize>,
}

impl EffectNode {
    pub(crate) fn new(body: Box<dyn FnMut()>) -> Self {
        Self {
            id: SubscriberId::new(),
            body: RefCell::new(Some(body)),
            sources: RefCell::new(TrackedSources::new()),
            disposed: Cell::new(false),
            runs: Cell::new(0),
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    /// Execute the body once and refresh the subscription set.
    pub(crate) fn run(&self) {
        if self.disposed.get() {
            return;
        }

        let Ok(mut body) = self.body.try_borrow_mut() else {
            warn!(subscriber = ?self.id, "effect re-entered its own run, skipping");
            return;
        };
        let Some(run) = body.as_mut() else {
            return;
        };

        let scope = RunScope {
            node: self,
            ctx: Some(ReactiveContext::enter(self.id)),
        };
        run();
        let sources = scope.finish();
        drop(body);

        self.runs.set(self.runs.get() + 1);

        if self.disposed.get() {
            // Disposed from inside its own body: the reads of this run must not
            // outlive it.
            unsubscribe_all(self.id, sources);
            let body = self.body.borrow_mut().take();
            drop(body);
        } else {
            self.replace_sources(sources);
        }
    }

    fn replace_sources(&self, current: TrackedSources) {
        let previous = mem::replace(&mut *self.sources.borrow_mut(), current);

        let stale: SmallVec<[Weak<dyn Source>; 4]> = {
            let current = self.sources.borrow();
            previous
                .into_iter()
                .filter(|(id, _)| !current.contains_key(id))
                .map(|(_, source)| source)
                .collect()
        };

        if !stale.is_empty() {
            trace!(subscriber = ?self.id, pruned = stale.len(), "dropping stale subscriptions");
        }
        for source in stale {
            if let Some(source) = source.upgrade() {
                source.unsubscribe(self.id);
            }
        }
    }

    /// Called by the runtime once the effect has left its registry.
    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        let sources = mem::take(&mut *self.sources.borrow_mut());
        unsubscribe_all(self.id, sources);

        // Release the body now unless it is running; a running body is
        // released at the end of its run.
        let body = self.body.try_borrow_mut().ok().and_then(|mut body| body.take());
        drop(body);
    }

    pub(crate) fn run_count(&self) -> usize {
        self.runs.get()
    }

    pub(crate) fn dependencies(&self) -> Vec<SourceId> {
        self.sources.borrow().keys().copied().collect()
    }
}

/// The tracking context of one run. If the body unwinds, the cells it read
/// before panicking are still recorded so that disposal can reach them.
struct RunScope<'a> {
    node: &'a EffectNode,
    ctx: Option<ReactiveContext>,
}

impl RunScope<'_> {
    fn finish(mut self) -> TrackedSources {
        self.ctx.take().map(ReactiveContext::finish).unwrap_or_default()
    }
}

impl Drop for RunScope<'_> {
    fn drop(&mut self) {
        let Some(ctx) = self.ctx.take() else {
            return;
        };
        let read = ctx.finish();
        if self.node.disposed.get() {
            unsubscribe_all(self.node.id, read);
            return;
        }
        if let Ok(mut sources) = self.node.sources.try_borrow_mut() {
            for (id, source) in read {
                sources.entry(id).or_insert(source);
            }
        }
    }
}

fn unsubscribe_all(subscriber: SubscriberId, sources: TrackedSources) {
    for (_, source) in sources {
        if let Some(source) = source.upgrade() {
            source.unsubscribe(subscriber);
        }
    }
}

impl fmt::Debug for EffectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectNode")
            .field("id", &self.id)
            .field("runs", &self.runs.get())
            .field("dependency_count", &self.sources.borrow().len())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

/// Handle that tears an effect down.
///
/// Dropping a `Disposer` does **not** dispose the effect; an effect lives
/// until [`dispose`](Disposer::dispose) is called.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Disposer {
    id: SubscriberId,
}

impl Disposer {
    /// The subscriber id of the effect.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Dispose of the effect. Idempotent.
    pub fn dispose(&self) {
        Runtime::try_with(|rt| rt.dispose(self.id));
    }

    pub fn is_disposed(&self) -> bool {
        Runtime::try_with(|rt| !rt.is_live(self.id)).unwrap_or(true)
    }

    /// How many times the effect has run so far. `0` once disposed.
    pub fn run_count(&self) -> usize {
        self.with_node(|node| node.run_count()).unwrap_or(0)
    }

    /// Ids of the cells the effect read during its last run.
    pub fn dependencies(&self) -> Vec<SourceId> {
        self.with_node(|node| node.dependencies()).unwrap_or_default()
    }

    /// Turn this handle into a boxed teardown callback.
    pub fn into_cleanup(self) -> Box<dyn FnOnce()> {
        Box::new(move || self.dispose())
    }

    fn with_node<R>(&self, f: impl FnOnce(&EffectNode) -> R) -> Option<R> {
        Runtime::try_with(|rt| rt.effect(self.id)).flatten().map(|node| f(&node))
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Keeps an internal effect alive for as long as its owner is, and disposes
/// it on drop. Used by derived values.
pub(crate) struct EffectOwner {
    disposer: Disposer,
}

impl EffectOwner {
    pub(crate) fn new(disposer: Disposer) -> Self {
        Self { disposer }
    }

    pub(crate) fn disposer(&self) -> Disposer {
        self.disposer
    }
}

impl Drop for EffectOwner {
    fn drop(&mut self) {
        self.disposer.dispose();
    }
}

/// Create an effect that re-runs `f` whenever a cell it reads changes.
///
/// The first run is deferred to the next flush.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use fly_core::reactive::{create_effect, create_signal, tick};
///
/// let count = create_signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let (c, s) = (count.clone(), seen.clone());
/// let disposer = create_effect(move || s.set(c.get()));
///
/// tick().unwrap();
/// assert_eq!(seen.get(), 0);
///
/// count.set(5);
/// tick().unwrap();
/// assert_eq!(seen.get(), 5);
///
/// disposer.dispose();
/// count.set(6);
/// tick().unwrap();
/// assert_eq!(seen.get(), 5);
/// ```
pub fn create_effect<F>(f: F) -> Disposer
where
    F: FnMut() + 'static,
{
    let node = Rc::new(EffectNode::new(Box::new(f)));
    let id = node.id();
    Runtime::with(|rt| rt.register(node));
    trace!(subscriber = ?id, "effect created");
    Disposer { id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_signal, tick};

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        (runs.clone(), runs)
    }

    #[test]
    fn effect_runs_on_next_flush_not_on_creation() {
        let (runs, r) = counter();
        let disposer = create_effect(move || r.set(r.get() + 1));

        assert_eq!(runs.get(), 0);
        assert_eq!(disposer.run_count(), 0);

        assert_eq!(tick(), Ok(1));
        assert_eq!(runs.get(), 1);
        assert_eq!(disposer.run_count(), 1);
    }

    #[test]
    fn effect_re_runs_when_dependency_changes() {
        let signal = create_signal(1);
        let (runs, r) = counter();
        let s = signal.clone();
        let _disposer = create_effect(move || {
            s.get();
            r.set(r.get() + 1);
        });

        tick().unwrap();
        signal.set(2);
        tick().unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn disposing_pending_effect_cancels_its_run() {
        let (runs, r) = counter();
        let disposer = create_effect(move || r.set(r.get() + 1));

        disposer.dispose();
        assert!(disposer.is_disposed());
        assert_eq!(tick(), Ok(0));
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let signal = create_signal(0);
        let s = signal.clone();
        let disposer = create_effect(move || {
            s.get();
        });
        tick().unwrap();

        disposer.dispose();
        disposer.dispose();

        assert!(disposer.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn dispose_unsubscribes_from_every_cell() {
        let a = create_signal(1);
        let b = create_signal(2);
        let (sa, sb) = (a.clone(), b.clone());
        let disposer = create_effect(move || {
            sa.get();
            sb.get();
        });
        tick().unwrap();
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(disposer.dependencies(), vec![a.id(), b.id()]);

        disposer.dispose();
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        assert!(disposer.dependencies().is_empty());
    }

    #[test]
    fn stale_subscriptions_are_pruned_after_each_run() {
        let use_a = create_signal(true);
        let a = create_signal(1);
        let b = create_signal(2);
        let (runs, r) = counter();

        let (flag, sa, sb) = (use_a.clone(), a.clone(), b.clone());
        let _disposer = create_effect(move || {
            r.set(r.get() + 1);
            if flag.get() {
                sa.get();
            } else {
                sb.get();
            }
        });

        tick().unwrap();
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        use_a.set(false);
        tick().unwrap();
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        // Writing the cell that is no longer read does not re-run the effect.
        a.set(10);
        assert_eq!(tick(), Ok(0));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn effect_can_dispose_itself() {
        let signal = create_signal(0);
        let slot: Rc<Cell<Option<Disposer>>> = Rc::new(Cell::new(None));
        let (runs, r) = counter();

        let (s, own) = (signal.clone(), slot.clone());
        let disposer = create_effect(move || {
            r.set(r.get() + 1);
            if s.get() > 0 {
                if let Some(disposer) = own.get() {
                    disposer.dispose();
                }
            }
        });
        slot.set(Some(disposer));

        tick().unwrap();
        signal.set(1);
        tick().unwrap();
        assert!(disposer.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(2);
        tick().unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn panicking_run_keeps_its_reads_reachable_by_dispose() {
        let flag = create_signal(false);
        let other = create_signal(0);

        let (f, o) = (flag.clone(), other.clone());
        let disposer = create_effect(move || {
            if f.get() {
                o.get();
                panic!("effect failed");
            }
        });
        tick().unwrap();

        flag.set(true);
        let result = std::panic::catch_unwind(|| tick());
        assert!(result.is_err());
        assert_eq!(other.subscriber_count(), 1);
        assert_eq!(disposer.dependencies(), vec![flag.id(), other.id()]);

        disposer.dispose();
        assert_eq!(flag.subscriber_count(), 0);
        assert_eq!(other.subscriber_count(), 0);
    }

    #[test]
    fn dropping_the_disposer_keeps_the_effect_alive() {
        let signal = create_signal(0);
        let (runs, r) = counter();
        let s = signal.clone();
        drop(create_effect(move || {
            s.get();
            r.set(r.get() + 1);
        }));

        tick().unwrap();
        signal.set(1);
        tick().unwrap();
        assert_eq!(runs.get(), 2);
    }
}
