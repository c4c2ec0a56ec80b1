//! Reactive Primitives
//!
//! This module implements the engine at the heart of Fly: signals, effects,
//! computed values and memos, plus the scheduler that decides when effects
//! run.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a single mutable value slot. Reading it while an effect
//! is running subscribes that effect. Writing it compares the old and new
//! values according to the value's [`SignalValue`] policy and, on a change,
//! enqueues every subscriber.
//!
//! ## Effects
//!
//! An effect ([`create_effect`]) is a computation that re-runs whenever a
//! cell it read during its last run changes. Its subscriptions are rebuilt on
//! every run and it keeps running until disposed through its [`Disposer`].
//!
//! ## Derived values
//!
//! [`create_computed`], [`derive`] and [`create_memo`] return a
//! [`ReadSignal`] whose value is written only by an internal effect.
//!
//! ## Scheduling
//!
//! Writes never run anything synchronously. They enqueue subscribers in a
//! de-duplicated pending set and request a flush; the host runs the flush
//! with [`tick`]. Many writes before a tick coalesce into one pass, and work
//! enqueued during a pass runs in that same pass.
//!
//! # Implementation Notes
//!
//! The current-effect marker is a thread-local stack managed by
//! [`ReactiveContext`] guards, so it is restored on every exit path,
//! unwinding included. All engine state is per thread.

mod context;
mod effect;
mod memo;
mod runtime;
mod scheduler;
mod signal;
mod subscriber;
mod value;

pub use context::ReactiveContext;
pub use effect::{create_effect, Disposer};
pub use memo::{create_computed, create_memo, derive, Equality};
pub use runtime::{config, configure, has_pending, tick, untrack};
#[cfg(feature = "tokio")]
pub use runtime::settle;
pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
pub use subscriber::{SourceId, SubscriberId};
pub use value::SignalValue;
