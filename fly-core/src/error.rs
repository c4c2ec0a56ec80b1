//! Error types.
//!
//! Every failure in Fly is local to its caller: there is no global error
//! channel and nothing is retried. Lookups never fall back to a default value,
//! so "never created" stays distinguishable from "holds an empty value".

use thiserror::Error;

/// Failures raised by the reactive scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A single flush executed more subscriber runs than the configured limit.
    ///
    /// This almost always means an effect writes a cell that it also reads.
    /// The remaining pending work is dropped and the scheduler is reset.
    #[error("flush exceeded {limit} subscriber runs; an effect is likely writing a cell it reads")]
    FlushLimitExceeded {
        /// The configured `max_flush_runs`.
        limit: usize,
    },
}

/// Failures raised while parsing attribute-supplied data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("unexpected character {found:?} at offset {offset}, expected {expected}")]
    UnexpectedChar {
        found: char,
        offset: usize,
        expected: &'static str,
    },

    #[error("invalid number {text:?} at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },

    #[error("nesting too deep at offset {offset}")]
    TooDeep { offset: usize },

    #[error("trailing input at offset {offset}")]
    TrailingInput { offset: usize },
}

/// Failures raised by the component layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("Component with id {id} not found")]
    ComponentNotFound { id: String },

    #[error("Reactive data \"{key}\" not found in component {component}")]
    ReactiveDataNotFound { key: String, component: String },

    #[error("Directive {name} already exists")]
    DuplicateDirective { name: String },

    #[error("Invalid data, please provide data in format {prefix}data=\"{{prop: value}}\"")]
    MissingData { prefix: String },

    #[error(
        "Invalid data, please provide valid data, an example is {prefix}data=\"{{counter: 5}}\", otherwise remove the directive"
    )]
    InvalidData { prefix: String },

    #[error("malformed component data: {0}")]
    Data(#[from] DataError),
}

/// Failures raised by the keyed state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("State key \"{key}\" already exists.")]
    AlreadyExists { key: String },

    #[error("State key \"{key}\" does not exist.")]
    NotFound { key: String },
}
