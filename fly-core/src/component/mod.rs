//! Markup Components
//!
//! This module connects the reactive engine to marked-up element trees.
//!
//! # Concepts
//!
//! ## Components
//!
//! An element with the reactive attribute is a component root. Its data
//! attribute holds an object literal ([`data`]) whose entries become
//! signals owned by the [`Component`].
//!
//! ## Directives
//!
//! Prefixed attributes such as `fly-text` are directives. Each one is
//! handled by a function registered in a [`DirectiveRegistry`]; handlers
//! may bind elements to the component's signals and return a teardown.
//!
//! # Example
//!
//! ```rust
//! use fly_core::component::{ComponentRegistry, DirectiveRegistry};
//! use fly_core::config::ComponentConfig;
//! use fly_core::dom::Element;
//!
//! let config = ComponentConfig::default();
//! let directives = DirectiveRegistry::with_builtins(&config);
//! let registry = ComponentRegistry::new(config);
//!
//! let root = Element::new("div")
//!     .with_attribute("reactive", "greeting")
//!     .with_attribute("fly-data", "{name: 'Fly'}")
//!     .with_attribute("fly-text", "name");
//!
//! let report = registry.initialize(&root, &directives);
//! assert!(report.is_ok());
//! assert_eq!(root.text_content(), "Fly");
//! ```

pub mod data;
mod directive;
mod registry;

pub use directive::{display, DirectiveHandler, DirectiveRegistry, Teardown};
pub use registry::{
    matching_directive_properties, Component, ComponentRegistry, InitFailure, InitReport, LifecycleEvent,
};
