//! Derived Values
//!
//! A derived value is a read-only cell whose value is produced by an
//! internally owned effect. The cell is seeded synchronously when the value
//! is created; the internal effect then runs at the next flush to establish
//! its dependencies, and again every time one of them changes.
//!
//! # Computed vs. Memo
//!
//! - [`create_computed`] writes every recomputation into its cell. Only a
//!   result that is not identical to the current value propagates.
//! - [`create_memo`] puts an [`Equality`] gate in front of the write. The
//!   gate compares against the last value the memo itself wrote and, when it
//!   lets a value through, that value always propagates. With
//!   [`Equality::Never`] every recomputation propagates, even an identical
//!   one.
//!
//! Derived cells always replace their value; record-like results are not
//! merged into the previous result.

use std::fmt;
use std::rc::Rc;

use super::effect::create_effect;
use super::runtime::untrack;
use super::signal::{ReadSignal, SignalInner};
use super::value::SignalValue;

/// Equality policy of a memo.
pub enum Equality<T> {
    /// Propagate only when the new value is not identical to the previous one.
    Strict,
    /// Propagate every recomputation.
    Never,
    /// Propagate when the predicate reports the values as *not* equal.
    Custom(Rc<dyn Fn(&T, &T) -> bool>),
}

impl<T: SignalValue> Equality<T> {
    pub fn custom(predicate: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self::Custom(Rc::new(predicate))
    }

    /// Whether `next` counts as equal to `previous`, i.e. should be dropped.
    pub fn is_equal(&self, previous: &T, next: &T) -> bool {
        match self {
            Self::Strict => previous.is_identical(next),
            Self::Never => false,
            Self::Custom(predicate) => predicate(previous, next),
        }
    }
}

impl<T> Default for Equality<T> {
    fn default() -> Self {
        Self::Strict
    }
}

/// `true` is [`Equality::Strict`], `false` is [`Equality::Never`].
impl<T> From<bool> for Equality<T> {
    fn from(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Never
        }
    }
}

impl<T> Clone for Equality<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Strict => Self::Strict,
            Self::Never => Self::Never,
            Self::Custom(predicate) => Self::Custom(Rc::clone(predicate)),
        }
    }
}

impl<T> fmt::Debug for Equality<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("Strict"),
            Self::Never => f.write_str("Never"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A read-only cell kept equal to `f()`.
///
/// # Example
///
/// ```rust
/// use fly_core::reactive::{create_computed, create_signal, tick};
///
/// let count = create_signal(2);
/// let c = count.clone();
/// let doubled = create_computed(move || c.get() * 2);
/// assert_eq!(doubled.get(), 4);
///
/// tick().unwrap();
/// count.set(5);
/// tick().unwrap();
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn create_computed<T, F>(f: F) -> ReadSignal<T>
where
    T: SignalValue,
    F: Fn() -> T + 'static,
{
    let inner = SignalInner::new(untrack(&f));

    let cell = Rc::clone(&inner);
    let disposer = create_effect(move || cell.replace(f()));

    ReadSignal::derived(inner, disposer)
}

/// `create_computed(|| transform(source()))`.
pub fn derive<S, T, U, G>(source: S, transform: G) -> ReadSignal<U>
where
    S: Fn() -> T + 'static,
    G: Fn(T) -> U + 'static,
    U: SignalValue,
{
    create_computed(move || transform(source()))
}

/// A read-only cell kept equal to `f()`, propagating only the
/// recomputations that pass `equals`.
///
/// `equals` accepts `true` (strict identity, the default policy), `false`
/// (always propagate) or an [`Equality`].
pub fn create_memo<T, F>(f: F, equals: impl Into<Equality<T>>) -> ReadSignal<T>
where
    T: SignalValue,
    F: Fn() -> T + 'static,
{
    let equals = equals.into();
    let seed = untrack(&f);
    let inner = SignalInner::new(seed.clone());

    let cell = Rc::clone(&inner);
    let mut previous = seed;
    let disposer = create_effect(move || {
        let next = f();
        if !equals.is_equal(&previous, &next) {
            previous = next.clone();
            cell.force(next);
        }
    });

    ReadSignal::derived(inner, disposer)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
