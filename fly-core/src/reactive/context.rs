//! Reactive Context
//!
//! The reactive context is the current-effect marker: it records which
//! subscriber is executing right now so that reading a cell can register that
//! subscriber without the effect handle being threaded through every call.
//!
//! # Implementation
//!
//! A thread-local stack of entries. Entering a context pushes an entry and
//! returns a guard; the entry is popped when the guard is dropped, including
//! during unwinding, so a panicking effect body can never leave a stale
//! marker behind. Each entry also collects the cells read while it is on top
//! of the stack, which the owning effect uses to prune subscriptions it no
//! longer exercises.
//!
//! Only one subscriber body executes at a time. The stack exists so that
//! `untrack` and derived-value construction inside a running effect restore
//! the outer marker afterwards instead of clearing it.

use std::cell::RefCell;
use std::rc::Weak;

use indexmap::IndexMap;

use super::subscriber::{Source, SourceId, SubscriberId};

/// Cells read during one tracked run, in first-read order.
pub(crate) type TrackedSources = IndexMap<SourceId, Weak<dyn Source>>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

struct ContextEntry {
    /// `None` for an untracked scope.
    subscriber: Option<SubscriberId>,
    sources: TrackedSources,
}

/// Guard that pops the context when dropped.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ReactiveContext {
    subscriber: Option<SubscriberId>,
    exited: bool,
}

impl ReactiveContext {
    /// Enter a tracking context for `subscriber`.
    ///
    /// While the returned guard is alive, every cell read registers
    /// `subscriber` as a dependent.
    pub fn enter(subscriber: SubscriberId) -> Self {
        Self::push(Some(subscriber))
    }

    /// Enter a scope in which cell reads register nothing.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                sources: TrackedSources::new(),
            });
        });

        Self {
            subscriber,
            exited: false,
        }
    }

    /// Whether a subscriber is currently tracking reads.
    pub fn is_tracking() -> bool {
        Self::current_subscriber().is_some()
    }

    /// The subscriber executing right now, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK
            .try_with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber))
            .ok()
            .flatten()
    }

    /// Record a read of `source` and return the subscriber to register on it.
    pub(crate) fn track(source_id: SourceId, source: impl FnOnce() -> Weak<dyn Source>) -> Option<SubscriberId> {
        CONTEXT_STACK
            .try_with(|stack| {
                let mut stack = stack.borrow_mut();
                let entry = stack.last_mut()?;
                let subscriber = entry.subscriber?;
                entry.sources.entry(source_id).or_insert_with(source);
                Some(subscriber)
            })
            .ok()
            .flatten()
    }

    /// Exit the context and hand back the cells read while it was active.
    pub(crate) fn finish(mut self) -> TrackedSources {
        self.exited = true;
        self.pop().map(|entry| entry.sources).unwrap_or_default()
    }

    fn pop(&self) -> Option<ContextEntry> {
        CONTEXT_STACK
            .try_with(|stack| {
                let popped = stack.borrow_mut().pop();
                if let Some(entry) = &popped {
                    debug_assert_eq!(
                        entry.subscriber, self.subscriber,
                        "ReactiveContext mismatch: expected {:?}, got {:?}",
                        self.subscriber, entry.subscriber
                    );
                }
                popped
            })
            .ok()
            .flatten()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.exited {
            self.pop();
        }
    }
}
