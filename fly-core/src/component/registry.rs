//! Component Registry
//!
//! Turns marked-up elements into components. An element carrying the
//! reactive attribute (`reactive="counter"`) becomes a component root: its
//! `fly-data` object is parsed, every non-null entry becomes a signal, and
//! the registered directives are applied to the root and its subtree.
//!
//! # Initialization
//!
//! [`ComponentRegistry::initialize`] processes every root under (and
//! including) the element it is given, in document order. Each root either
//! succeeds or fails on its own. A failure is logged and recorded in the
//! returned [`InitReport`] and never prevents the remaining roots from being
//! initialized.
//!
//! On success the root is stamped with its generated id and the lifecycle
//! event `fly:reactive:<id>` is emitted.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::data::parse_component_data;
use super::directive::{DirectiveRegistry, Teardown};
use crate::config::ComponentConfig;
use crate::dom::{Element, Event};
use crate::emitter::Emitter;
use crate::error::ComponentError;
use crate::reactive::Signal;

static NEXT_COMPONENT: AtomicU64 = AtomicU64::new(1);

/// A component: an id, an optional name and its reactive data cells.
pub struct Component {
    id: String,
    name: Option<String>,
    reactive_data: IndexMap<String, Signal<Value>>,
}

impl Component {
    /// Create a component with a fresh id and one signal per non-null entry
    /// of `data`.
    pub fn new(name: Option<String>, data: Map<String, Value>) -> Self {
        let id = format!("c{}", NEXT_COMPONENT.fetch_add(1, Ordering::Relaxed));
        let reactive_data = data
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key, Signal::new(value)))
            .collect();

        Self {
            id,
            name,
            reactive_data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The signal holding `key`.
    pub fn use_reactive_data(&self, key: &str) -> Result<Signal<Value>, ComponentError> {
        self.reactive_data
            .get(key)
            .cloned()
            .ok_or_else(|| ComponentError::ReactiveDataNotFound {
                key: key.to_string(),
                component: self.id.clone(),
            })
    }

    pub fn reactive_keys(&self) -> impl Iterator<Item = &str> {
        self.reactive_data.keys().map(String::as_str)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("reactive_data", &self.reactive_data)
            .finish()
    }
}

/// Payload of lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub id: String,
    pub name: Option<String>,
}

/// A root that could not be initialized.
#[derive(Debug)]
pub struct InitFailure {
    pub element: Element,
    pub error: ComponentError,
}

/// Outcome of [`ComponentRegistry::initialize`].
#[derive(Debug, Default)]
pub struct InitReport {
    /// Ids of the components created, in document order.
    pub initialized: Vec<String>,
    pub failures: Vec<InitFailure>,
}

impl InitReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Mounted {
    component: Rc<Component>,
    element: Element,
    teardown: Teardown,
}

pub struct ComponentRegistry {
    config: ComponentConfig,
    components: RefCell<IndexMap<String, Mounted>>,
    emitter: Emitter<LifecycleEvent>,
}

impl ComponentRegistry {
    pub fn new(config: ComponentConfig) -> Self {
        Self {
            config,
            components: RefCell::new(IndexMap::new()),
            emitter: Emitter::new(),
        }
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    /// Lifecycle events are emitted here, named `<prefix>reactive:<id>` and
    /// `<prefix>destroyed:<id>`.
    pub fn emitter(&self) -> &Emitter<LifecycleEvent> {
        &self.emitter
    }

    /// Name of the event emitted when component `id` is initialized.
    pub fn initialized_event(&self, id: &str) -> String {
        format!("{}reactive:{}", self.config.event_prefix, id)
    }

    /// Name of the event emitted when component `id` is destroyed.
    pub fn destroyed_event(&self, id: &str) -> String {
        format!("{}destroyed:{}", self.config.event_prefix, id)
    }

    /// Initialize every component root under `root`, `root` included.
    ///
    /// Roots that already carry an id are skipped, so calling this again
    /// after adding markup only picks up the new roots.
    pub fn initialize(&self, root: &Element, directives: &DirectiveRegistry) -> InitReport {
        let mut report = InitReport::default();

        for element in root.select_with_attribute(&self.config.reactive_attribute) {
            if element.has_attribute(&self.config.id_attribute) {
                continue;
            }

            match self.initialize_element(&element, directives) {
                Ok(id) => report.initialized.push(id),
                Err(error) => {
                    warn!(tag = %element.tag(), %error, "component initialization failed");
                    report.failures.push(InitFailure { element, error });
                }
            }
        }

        debug!(
            initialized = report.initialized.len(),
            failed = report.failures.len(),
            "components initialized"
        );
        report
    }

    fn initialize_element(&self, element: &Element, directives: &DirectiveRegistry) -> Result<String, ComponentError> {
        let name = element
            .attribute(&self.config.reactive_attribute)
            .filter(|name| !name.is_empty());
        let has_directives = !directives.known_on(element).is_empty();

        let data = match element
            .attribute(&directives.attribute_name("data"))
            .filter(|raw| !raw.trim().is_empty())
        {
            Some(raw) => Some(parse_component_data(&raw, directives.prefix())?),
            None => None,
        };
        if has_directives && data.is_none() {
            return Err(ComponentError::MissingData {
                prefix: directives.prefix().to_string(),
            });
        }

        let data = data.unwrap_or_default();
        let matches = matching_directive_properties(element, &data, directives);
        let component = Rc::new(Component::new(name, data));
        let id = component.id().to_string();
        element.set_attribute(&self.config.id_attribute, &id);

        for (directive, properties) in &matches {
            debug!(component = %id, %directive, ?properties, "directive matches reactive data");
        }

        let teardown = directives.apply(element, &component);
        let event = LifecycleEvent {
            id: id.clone(),
            name: component.name().map(str::to_string),
        };
        self.components.borrow_mut().insert(
            id.clone(),
            Mounted {
                component,
                element: element.clone(),
                teardown,
            },
        );

        let event_name = self.initialized_event(&id);
        debug!(component = %id, event = %event_name, "component initialized");
        element.dispatch_event(&Event::new(event_name.clone()));
        self.emitter.emit(&event_name, &event);
        Ok(id)
    }

    /// The component registered under `id`.
    pub fn get(&self, id: &str) -> Result<Rc<Component>, ComponentError> {
        self.components
            .borrow()
            .get(id)
            .map(|mounted| Rc::clone(&mounted.component))
            .ok_or_else(|| ComponentError::ComponentNotFound { id: id.to_string() })
    }

    /// The component whose root is `element`, if it has been initialized.
    pub fn for_element(&self, element: &Element) -> Result<Rc<Component>, ComponentError> {
        match element.attribute(&self.config.id_attribute) {
            Some(id) => self.get(&id),
            None => Err(ComponentError::ComponentNotFound { id: String::new() }),
        }
    }

    /// Every component named `name`, in initialization order.
    pub fn by_name(&self, name: &str) -> Vec<Rc<Component>> {
        self.components
            .borrow()
            .values()
            .filter(|mounted| mounted.component.name() == Some(name))
            .map(|mounted| Rc::clone(&mounted.component))
            .collect()
    }

    /// Unregister a component, run its directive teardown and remove the id
    /// stamp from its root.
    pub fn destroy(&self, id: &str) -> Result<(), ComponentError> {
        let mounted = self
            .components
            .borrow_mut()
            .shift_remove(id)
            .ok_or_else(|| ComponentError::ComponentNotFound { id: id.to_string() })?;

        mounted.teardown.run();
        mounted.element.remove_attribute(&self.config.id_attribute);

        let event = LifecycleEvent {
            id: id.to_string(),
            name: mounted.component.name().map(str::to_string),
        };
        let event_name = self.destroyed_event(id);
        debug!(component = id, "component destroyed");
        self.emitter.emit(&event_name, &event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.components.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.borrow().is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(ComponentConfig::default())
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("config", &self.config)
            .field("components", &self.components.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// For every known directive on `element` other than the data directive,
/// the data keys that occur in the directive's attribute value.
///
/// Matching is by substring, so `fly-text="count"` matches both `count` and
/// `co`. Directives without a match are omitted.
pub fn matching_directive_properties(
    element: &Element,
    data: &Map<String, Value>,
    directives: &DirectiveRegistry,
) -> IndexMap<String, Vec<String>> {
    let data_attribute = directives.attribute_name("data");
    let mut matches = IndexMap::new();

    for directive in directives.known_on(element) {
        if directive == data_attribute {
            continue;
        }
        let Some(value) = element.attribute(&directive).filter(|value| !value.is_empty()) else {
            continue;
        };

        let properties: Vec<String> = data.keys().filter(|key| value.contains(key.as_str())).cloned().collect();
        if !properties.is_empty() {
            matches.insert(directive, properties);
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::tick;
    use serde_json::json;
    use std::cell::Cell;

    fn setup() -> (ComponentRegistry, DirectiveRegistry) {
        let config = ComponentConfig::default();
        let directives = DirectiveRegistry::with_builtins(&config);
        (ComponentRegistry::new(config), directives)
    }

    #[test]
    fn initializes_marked_elements() {
        let (registry, directives) = setup();
        let root = Element::new("div")
            .with_attribute("reactive", "counter")
            .with_attribute("fly-data", "{count: 5, label: null}")
            .with_child(Element::new("span").with_attribute("fly-text", "count"));

        let report = registry.initialize(&root, &directives);
        assert!(report.is_ok());
        assert_eq!(report.initialized.len(), 1);

        let id = root.attribute("data-reactive-id").unwrap();
        let component = registry.get(&id).unwrap();
        assert_eq!(component.name(), Some("counter"));
        assert_eq!(component.reactive_keys().collect::<Vec<_>>(), ["count"]);
        assert_eq!(root.text_content(), "5");

        tick().unwrap();
        component.use_reactive_data("count").unwrap().set(json!(6));
        tick().unwrap();
        assert_eq!(root.text_content(), "6");
    }

    #[test]
    fn lookups_fail_without_defaults() {
        let (registry, _) = setup();
        assert_eq!(
            registry.get("missing").unwrap_err(),
            ComponentError::ComponentNotFound {
                id: "missing".to_string()
            }
        );

        let component = Component::new(None, Map::new());
        assert_eq!(
            component.use_reactive_data("x").unwrap_err(),
            ComponentError::ReactiveDataNotFound {
                key: "x".to_string(),
                component: component.id().to_string(),
            }
        );
    }

    #[test]
    fn failures_are_isolated_per_element() {
        let (registry, directives) = setup();
        let broken = Element::new("div")
            .with_attribute("reactive", "a")
            .with_attribute("fly-text", "count");
        let invalid = Element::new("div")
            .with_attribute("reactive", "b")
            .with_attribute("fly-data", "{}");
        let good = Element::new("div")
            .with_attribute("reactive", "c")
            .with_attribute("fly-data", "{count: 1}");
        let page = Element::new("body")
            .with_child(broken.clone())
            .with_child(invalid)
            .with_child(good.clone());

        let report = registry.initialize(&page, &directives);
        assert_eq!(report.initialized.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].element.ptr_eq(&broken));
        assert_eq!(
            report.failures[0].error,
            ComponentError::MissingData {
                prefix: "fly-".to_string()
            }
        );
        assert!(matches!(report.failures[1].error, ComponentError::InvalidData { .. }));
        assert!(!broken.has_attribute("data-reactive-id"));
        assert!(good.has_attribute("data-reactive-id"));
    }

    #[test]
    fn unnamed_components_and_lookup_by_name() {
        let (registry, directives) = setup();
        let page = Element::new("body")
            .with_child(Element::new("div").with_attribute("reactive", ""))
            .with_child(Element::new("div").with_attribute("reactive", "card"))
            .with_child(Element::new("div").with_attribute("reactive", "card"));

        let report = registry.initialize(&page, &directives);
        assert_eq!(report.initialized.len(), 3);
        assert_eq!(registry.by_name("card").len(), 2);
        assert_eq!(registry.get(&report.initialized[0]).unwrap().name(), None);

        // A second pass finds nothing new.
        assert!(registry.initialize(&page, &directives).initialized.is_empty());
    }

    #[test]
    fn lifecycle_events_are_emitted() {
        let (registry, directives) = setup();
        let root = Element::new("div").with_attribute("reactive", "x");

        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        let report = registry.initialize(&root, &directives);
        let id = report.initialized[0].clone();
        registry.emitter().on(registry.destroyed_event(&id), move |event: &LifecycleEvent| {
            assert_eq!(event.name.as_deref(), Some("x"));
            s.set(s.get() + 1);
        });

        registry.destroy(&id).unwrap();
        assert_eq!(seen.get(), 1);
        assert!(registry.is_empty());
        assert!(!root.has_attribute("data-reactive-id"));
        assert!(registry.destroy(&id).is_err());
    }

    #[test]
    fn destroy_runs_directive_teardown() {
        let (registry, directives) = setup();
        let root = Element::new("p")
            .with_attribute("reactive", "")
            .with_attribute("fly-data", "{msg: 'hi'}")
            .with_attribute("fly-text", "msg");
        let id = registry.initialize(&root, &directives).initialized[0].clone();
        let msg = registry.get(&id).unwrap().use_reactive_data("msg").unwrap();
        tick().unwrap();

        registry.destroy(&id).unwrap();
        msg.set(json!("bye"));
        tick().unwrap();
        assert_eq!(root.text_content(), "hi");
        assert_eq!(msg.subscriber_count(), 0);
    }

    #[test]
    fn matching_properties_use_substrings() {
        let (_, directives) = setup();
        let element = Element::new("div")
            .with_attribute("fly-data", "{count: 1, co: 2, other: 3}")
            .with_attribute("fly-text", "count");
        let data = json!({"count": 1, "co": 2, "other": 3}).as_object().cloned().unwrap();

        let matches = matching_directive_properties(&element, &data, &directives);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches["fly-text"], vec!["count".to_string(), "co".to_string()]);
    }
}
