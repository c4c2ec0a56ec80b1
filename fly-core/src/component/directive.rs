//! Directives
//!
//! A directive is a handler bound to a prefixed attribute name, e.g.
//! `fly-text`. Applying directives to a component root walks the root and
//! its descendants, calls the handler of every registered attribute it finds
//! and collects the teardown closures the handlers return.
//!
//! The walk stops at nested component roots; those belong to their own
//! component and get their directives applied when it is initialized.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::registry::Component;
use crate::config::ComponentConfig;
use crate::dom::Element;
use crate::error::ComponentError;
use crate::reactive::create_effect;

/// Handler signature: the element, the attribute value and the component
/// that owns the element. A returned closure runs on teardown.
pub type DirectiveHandler =
    Rc<dyn Fn(&Element, &str, &Component) -> Result<Option<Box<dyn FnOnce()>>, ComponentError>>;

/// Cleanup collected by [`DirectiveRegistry::apply`].
#[derive(Default)]
pub struct Teardown {
    cleanups: Vec<Box<dyn FnOnce()>>,
}

impl Teardown {
    pub fn push(&mut self, cleanup: Box<dyn FnOnce()>) {
        self.cleanups.push(cleanup);
    }

    pub fn len(&self) -> usize {
        self.cleanups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleanups.is_empty()
    }

    /// Run every collected cleanup in registration order.
    pub fn run(self) {
        for cleanup in self.cleanups {
            cleanup();
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}

pub struct DirectiveRegistry {
    prefix: String,
    component_attribute: String,
    handlers: IndexMap<String, DirectiveHandler>,
}

impl DirectiveRegistry {
    /// An empty registry using the naming of `config`.
    pub fn new(config: &ComponentConfig) -> Self {
        Self {
            prefix: config.directive_prefix.clone(),
            component_attribute: config.reactive_attribute.clone(),
            handlers: IndexMap::new(),
        }
    }

    /// A registry with the built-in `data` and `text` directives.
    pub fn with_builtins(config: &ComponentConfig) -> Self {
        let mut registry = Self::new(config);
        let data: DirectiveHandler = Rc::new(data_directive);
        let text: DirectiveHandler = Rc::new(text_directive);
        for (name, handler) in [("data", data), ("text", text)] {
            let name = registry.attribute_name(name);
            registry.handlers.insert(name, handler);
        }
        registry
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full attribute name for a directive, with or without its prefix.
    pub fn attribute_name(&self, name: &str) -> String {
        if name.starts_with(&self.prefix) {
            name.to_string()
        } else {
            format!("{}{}", self.prefix, name)
        }
    }

    /// Register a handler. `name` may be given with or without the prefix.
    pub fn register<F>(&mut self, name: &str, handler: F) -> Result<(), ComponentError>
    where
        F: Fn(&Element, &str, &Component) -> Result<Option<Box<dyn FnOnce()>>, ComponentError> + 'static,
    {
        let name = self.attribute_name(name);
        if self.handlers.contains_key(&name) {
            return Err(ComponentError::DuplicateDirective { name });
        }

        debug!(directive = %name, "directive registered");
        self.handlers.insert(name, Rc::new(handler));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&self.attribute_name(name))
    }

    /// Attribute names of `element` that are registered directives, in
    /// attribute order.
    pub fn known_on(&self, element: &Element) -> Vec<String> {
        element
            .attributes()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| name.starts_with(&self.prefix) && self.handlers.contains_key(name))
            .collect()
    }

    /// Apply every directive found on `element` and its descendants.
    ///
    /// A handler error is logged and skipped; the remaining attributes and
    /// elements are still processed.
    pub fn apply(&self, element: &Element, component: &Component) -> Teardown {
        let mut teardown = Teardown::default();
        self.apply_into(element, component, &mut teardown);
        teardown
    }

    fn apply_into(&self, element: &Element, component: &Component, teardown: &mut Teardown) {
        for (name, value) in element.attributes() {
            if !name.starts_with(&self.prefix) {
                continue;
            }
            let Some(handler) = self.handlers.get(&name).cloned() else {
                continue;
            };

            match handler(element, &value, component) {
                Ok(Some(cleanup)) => teardown.push(cleanup),
                Ok(None) => {}
                Err(error) => {
                    warn!(directive = %name, component = component.id(), %error, "directive failed")
                }
            }
        }

        for child in element.child_elements() {
            if child.has_attribute(&self.component_attribute) {
                continue;
            }
            self.apply_into(&child, component, teardown);
        }
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("prefix", &self.prefix)
            .field("directives", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `fly-data` is read by the component registry before directives run, so
/// its handler has nothing left to do.
fn data_directive(
    _element: &Element,
    _value: &str,
    _component: &Component,
) -> Result<Option<Box<dyn FnOnce()>>, ComponentError> {
    Ok(None)
}

/// `fly-text`: bind the element's text to a reactive data key, or set the
/// attribute value as literal text when no such key exists.
fn text_directive(
    element: &Element,
    value: &str,
    component: &Component,
) -> Result<Option<Box<dyn FnOnce()>>, ComponentError> {
    let Ok(signal) = component.use_reactive_data(value.trim()) else {
        element.set_text_content(value);
        return Ok(None);
    };

    element.set_text_content(display(&signal.get_untracked()));

    let element = element.clone();
    let disposer = create_effect(move || element.set_text_content(display(&signal.get())));
    Ok(Some(disposer.into_cleanup()))
}

/// Text form of a data value: strings unquoted, everything else as JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::tick;
    use serde_json::json;
    use std::cell::Cell;

    fn component(data: Value) -> Component {
        Component::new(Some("test".to_string()), data.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn names_are_normalized_and_unique() {
        let mut registry = DirectiveRegistry::with_builtins(&ComponentConfig::default());
        assert!(registry.contains("text"));
        assert!(registry.contains("fly-text"));

        registry.register("fly-show", |_, _, _| Ok(None)).unwrap();
        assert_eq!(
            registry.register("show", |_, _, _| Ok(None)),
            Err(ComponentError::DuplicateDirective {
                name: "fly-show".to_string()
            })
        );
    }

    #[test]
    fn text_binds_reactive_data() {
        let registry = DirectiveRegistry::with_builtins(&ComponentConfig::default());
        let component = component(json!({"count": 1}));
        let root = Element::new("span").with_attribute("fly-text", "count");

        let teardown = registry.apply(&root, &component);
        assert_eq!(teardown.len(), 1);
        assert_eq!(root.text_content(), "1");

        tick().unwrap();
        component.use_reactive_data("count").unwrap().set(json!(2));
        tick().unwrap();
        assert_eq!(root.text_content(), "2");

        teardown.run();
        component.use_reactive_data("count").unwrap().set(json!(3));
        tick().unwrap();
        assert_eq!(root.text_content(), "2");
    }

    #[test]
    fn text_falls_back_to_literal() {
        let registry = DirectiveRegistry::with_builtins(&ComponentConfig::default());
        let component = component(json!({"count": 1}));
        let root = Element::new("p").with_attribute("fly-text", "Hello");

        let teardown = registry.apply(&root, &component);
        assert!(teardown.is_empty());
        assert_eq!(root.text_content(), "Hello");
    }

    #[test]
    fn failing_handler_does_not_stop_siblings() {
        let mut registry = DirectiveRegistry::with_builtins(&ComponentConfig::default());
        registry
            .register("broken", |_, _, _| {
                Err(ComponentError::ComponentNotFound {
                    id: "x".to_string(),
                })
            })
            .unwrap();

        let component = component(json!({"a": 1}));
        let root = Element::new("div")
            .with_attribute("fly-broken", "")
            .with_attribute("fly-text", "after");
        registry.apply(&root, &component);
        assert_eq!(root.text_content(), "after");
    }

    #[test]
    fn walk_skips_nested_component_roots() {
        let mut registry = DirectiveRegistry::new(&ComponentConfig::default());
        let visits = Rc::new(Cell::new(0));
        let v = visits.clone();
        registry
            .register("mark", move |_, _, _| {
                v.set(v.get() + 1);
                Ok(None)
            })
            .unwrap();

        let nested = Element::new("section")
            .with_attribute("reactive", "inner")
            .with_attribute("fly-mark", "");
        let root = Element::new("div")
            .with_attribute("fly-mark", "")
            .with_child(Element::new("p").with_attribute("fly-mark", ""))
            .with_child(nested);

        registry.apply(&root, &component(json!({"a": 1})));
        assert_eq!(visits.get(), 2);
    }

    #[test]
    fn display_unquotes_strings() {
        assert_eq!(display(&json!("hi")), "hi");
        assert_eq!(display(&json!(5)), "5");
        assert_eq!(display(&json!(null)), "null");
    }
}
