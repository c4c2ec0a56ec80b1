//! Fly Core
//!
//! This crate provides the core runtime for the Fly reactive UI library.
//! It implements:
//!
//! - Reactive primitives (signals, effects, computed values, memos)
//! - A batching scheduler that coalesces writes into one flush
//! - Markup components driven by attribute directives
//! - A small view layer with reactive text bindings
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives, dependency tracking and scheduling
//! - `component`: Component roots, attribute data and directives
//! - `view`: Virtual nodes, rendering and mountable components
//! - `dom`: In-memory element tree the other layers render into
//! - `emitter`, `store`: Named events and a keyed state store
//! - `config`, `error`: Configuration and error types
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use fly_core::reactive::{create_computed, create_effect, create_signal, tick};
//!
//! // Create a signal
//! let count = create_signal(0);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = create_computed(move || c.get() * 2);
//!
//! // Create an effect
//! let seen = Rc::new(Cell::new(0));
//! let (d, s) = (doubled.clone(), seen.clone());
//! let _effect = create_effect(move || s.set(d.get()));
//! tick().unwrap();
//!
//! // Update the signal; the effect runs at the next tick
//! count.set(5);
//! tick().unwrap();
//! assert_eq!(seen.get(), 10);
//! ```

pub mod component;
pub mod config;
pub mod dom;
pub mod emitter;
pub mod error;
pub mod reactive;
pub mod store;
pub mod view;

pub use config::Config;
pub use error::{ComponentError, DataError, ReactiveError, StateError};
