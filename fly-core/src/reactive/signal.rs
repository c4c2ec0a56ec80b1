//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive: a single mutable value
//! slot that remembers which effects read it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running, the effect is added
//!    to the signal's subscriber set. Adding an existing subscriber is a
//!    no-op.
//! 2. When a signal is written, the value type decides whether the write is
//!    a change (see [`SignalValue`]). Only a change commits and enqueues the
//!    subscribers.
//! 3. Nothing runs synchronously on write. Subscribers run at the next flush.
//!
//! # Handles
//!
//! [`Signal`] carries all three capabilities (read, write, update).
//! [`ReadSignal`] and [`WriteSignal`] split them; derived values only ever
//! hand out a `ReadSignal`. All handles are cheap `Rc` clones of the same
//! cell.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::mem;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::{Disposer, EffectOwner};
use super::runtime::Runtime;
use super::subscriber::{Source, SourceId, SubscriberId};
use super::value::SignalValue;

/// The shared cell behind every signal handle.
pub(crate) struct SignalInner<T> {
    id: SourceId,
    value: RefCell<T>,
    subscribers: RefCell<IndexSet<SubscriberId>>,
}

impl<T: SignalValue> SignalInner<T> {
    pub(crate) fn new(value: T) -> Rc<Self> {
        Rc::new(Self {
            id: SourceId::new(),
            value: RefCell::new(value),
            subscribers: RefCell::new(IndexSet::new()),
        })
    }

    fn track(self: &Rc<Self>) {
        let subscriber =
            ReactiveContext::track(self.id, || Rc::<Self>::downgrade(self) as Weak<dyn Source>);
        if let Some(subscriber) = subscriber {
            self.subscribers.borrow_mut().insert(subscriber);
        }
    }

    pub(crate) fn get(self: &Rc<Self>) -> T {
        self.track();
        self.value.borrow().clone()
    }

    pub(crate) fn with<R>(self: &Rc<Self>, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.value.borrow())
    }

    pub(crate) fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Write with the value type's own change detection.
    pub(crate) fn write(&self, incoming: T) {
        let next = T::reconcile(&self.value.borrow(), incoming);
        if let Some(next) = next {
            self.commit(next);
        }
    }

    /// Replace the value outright when it is not identical.
    pub(crate) fn replace(&self, next: T) {
        let identical = self.value.borrow().is_identical(&next);
        if !identical {
            self.commit(next);
        }
    }

    /// Commit and notify unconditionally.
    pub(crate) fn force(&self, next: T) {
        self.commit(next);
    }

    fn commit(&self, next: T) {
        let previous = mem::replace(&mut *self.value.borrow_mut(), next);
        drop(previous);
        self.notify();
    }

    fn notify(&self) {
        let subscribers: SmallVec<[SubscriberId; 8]> =
            self.subscribers.borrow().iter().copied().collect();
        if subscribers.is_empty() {
            return;
        }

        trace!(source = ?self.id, subscribers = subscribers.len(), "signal changed");
        Runtime::try_with(|rt| rt.schedule(&subscribers));
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T: SignalValue> Source for SignalInner<T> {
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&subscriber);
    }
}

/// A reactive cell with read, write and update capabilities.
///
/// # Example
///
/// ```rust
/// use fly_core::reactive::create_signal;
///
/// let count = create_signal(0);
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T: SignalValue> {
    inner: Rc<SignalInner<T>>,
}

impl<T: SignalValue> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: SignalInner::new(value),
        }
    }

    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Read the value, subscribing the running effect if there is one.
    pub fn get(&self) -> T {
        self.inner.get()
    }

    /// Borrow the value instead of cloning it. Tracks like [`Signal::get`].
    ///
    /// Writing this signal from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.with(f)
    }

    /// Read the value without subscribing anything.
    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }

    /// Write a value. Record-like values merge into the current value and
    /// always count as a change; everything else replaces it and is a change
    /// only when not identical.
    pub fn set(&self, value: T) {
        self.inner.write(value);
    }

    /// `set(f(current))`. `f` sees a snapshot and may read or write signals.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.inner.get_untracked();
        self.inner.write(f(&current));
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// A handle that can only read this cell.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            inner: Rc::clone(&self.inner),
            owner: None,
        }
    }

    pub fn write_only(&self) -> WriteSignal<T> {
        WriteSignal {
            inner: Rc::clone(&self.inner),
        }
    }

    pub fn split(&self) -> (ReadSignal<T>, WriteSignal<T>) {
        (self.read_only(), self.write_only())
    }
}

impl<T: SignalValue> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: SignalValue + Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Read capability of a cell.
///
/// Readers returned by [`create_computed`](super::create_computed) and
/// [`create_memo`](super::create_memo) own the effect that keeps them
/// current. That effect is disposed when the last clone of the reader is
/// dropped.
pub struct ReadSignal<T: SignalValue> {
    inner: Rc<SignalInner<T>>,
    owner: Option<Rc<EffectOwner>>,
}

impl<T: SignalValue> ReadSignal<T> {
    pub(crate) fn derived(inner: Rc<SignalInner<T>>, disposer: Disposer) -> Self {
        Self {
            inner,
            owner: Some(Rc::new(EffectOwner::new(disposer))),
        }
    }

    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.with(f)
    }

    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// The internal effect of a derived reader, `None` for plain signals.
    pub fn owner(&self) -> Option<Disposer> {
        self.owner.as_ref().map(|owner| owner.disposer())
    }
}

impl<T: SignalValue> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            owner: self.owner.clone(),
        }
    }
}

impl<T: SignalValue + Debug> Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("derived", &self.owner.is_some())
            .finish()
    }
}

/// Write and update capabilities of a cell.
pub struct WriteSignal<T: SignalValue> {
    inner: Rc<SignalInner<T>>,
}

impl<T: SignalValue> WriteSignal<T> {
    pub fn set(&self, value: T) {
        self.inner.write(value);
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.inner.get_untracked();
        self.inner.write(f(&current));
    }
}

impl<T: SignalValue> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: SignalValue> Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSignal").field("id", &self.inner.id).finish()
    }
}

/// Create a reactive cell seeded with `value`.
pub fn create_signal<T: SignalValue>(value: T) -> Signal<T> {
    Signal::new(value)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
