//! Views
//!
//! A small rendering layer on top of the reactive engine. Views are
//! described as [`VNode`] trees built with [`h`] and turned into
//! [`dom`](crate::dom) nodes with [`render`].
//!
//! Text content is either static or reactive ([`Content`]). Each reactive
//! text child gets its own effect that rewrites only that text node, so a
//! change never re-renders the surrounding elements. Props whose name starts
//! with `on` and that carry a [`Prop::Handler`] become event listeners.
//!
//! [`create_component`] wraps a render function into mountable instances
//! whose props live in a signal; changing the props re-renders the instance
//! in place.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::dom::{Element, Event, Node, Text};
use crate::reactive::{create_effect, untrack, Disposer, Signal};

/// A value that is either fixed or recomputed on demand.
pub enum Content<T> {
    Static(T),
    Reactive(Rc<dyn Fn() -> T>),
}

impl<T: Clone> Content<T> {
    pub fn reactive(f: impl Fn() -> T + 'static) -> Self {
        Self::Reactive(Rc::new(f))
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Self::Reactive(_))
    }

    /// The current value. Reading a reactive content tracks whatever it
    /// reads.
    pub fn get(&self) -> T {
        match self {
            Self::Static(value) => value.clone(),
            Self::Reactive(f) => f(),
        }
    }
}

impl<T: Clone> Clone for Content<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(value) => Self::Static(value.clone()),
            Self::Reactive(f) => Self::Reactive(Rc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Content<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Reactive(_) => f.write_str("Reactive(..)"),
        }
    }
}

impl From<&str> for Content<String> {
    fn from(text: &str) -> Self {
        Self::Static(text.to_string())
    }
}

impl From<String> for Content<String> {
    fn from(text: String) -> Self {
        Self::Static(text)
    }
}

/// An element property: a plain attribute or an event handler.
#[derive(Clone)]
pub enum Prop {
    Attr(String),
    Handler(Rc<dyn Fn(&Event)>),
}

impl Prop {
    pub fn attr(value: impl ToString) -> Self {
        Self::Attr(value.to_string())
    }

    pub fn handler(f: impl Fn(&Event) + 'static) -> Self {
        Self::Handler(Rc::new(f))
    }
}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attr(value) => f.debug_tuple("Attr").field(value).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Child {
    Node(VNode),
    Text(Content<String>),
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Self::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Self::Text(text.into())
    }
}

impl From<Content<String>> for Child {
    fn from(content: Content<String>) -> Self {
        Self::Text(content)
    }
}

/// Reactive text child.
pub fn text(f: impl Fn() -> String + 'static) -> Child {
    Child::Text(Content::reactive(f))
}

/// Description of an element.
#[derive(Debug, Clone)]
pub struct VNode {
    pub tag: String,
    pub props: IndexMap<String, Prop>,
    pub children: Vec<Child>,
}

/// Build a [`VNode`].
pub fn h<K, P, C>(tag: &str, props: P, children: C) -> VNode
where
    K: Into<String>,
    P: IntoIterator<Item = (K, Prop)>,
    C: IntoIterator<Item = Child>,
{
    VNode {
        tag: tag.to_string(),
        props: props.into_iter().map(|(key, prop)| (key.into(), prop)).collect(),
        children: children.into_iter().collect(),
    }
}

/// A rendered tree and the effects that keep its reactive text current.
pub struct Rendered {
    pub root: Element,
    pub effects: Vec<Disposer>,
}

impl Rendered {
    /// Dispose every effect created by the render. The element stays where
    /// it is but stops updating.
    pub fn dispose(self) -> Element {
        for effect in &self.effects {
            effect.dispose();
        }
        self.root
    }
}

impl fmt::Debug for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendered")
            .field("root", &self.root)
            .field("effects", &self.effects.len())
            .finish()
    }
}

/// Render `node` into a fresh element.
///
/// Reactive text is filled in immediately, without tracking, and then kept
/// current by one effect per text node from the next flush on.
pub fn render(node: &VNode) -> Rendered {
    let mut effects = Vec::new();
    let root = render_element(node, &mut effects);
    Rendered { root, effects }
}

fn render_element(node: &VNode, effects: &mut Vec<Disposer>) -> Element {
    let element = Element::new(node.tag.as_str());

    for (key, prop) in &node.props {
        match prop {
            Prop::Handler(handler) => {
                let event = key.strip_prefix("on").unwrap_or(key).to_lowercase();
                let handler = Rc::clone(handler);
                element.add_event_listener(event, move |event| handler(event));
            }
            Prop::Attr(value) => element.set_attribute(key.as_str(), value.as_str()),
        }
    }

    for child in &node.children {
        let rendered: Node = match child {
            Child::Node(node) => render_element(node, effects).into(),
            Child::Text(Content::Static(data)) => Text::new(data.as_str()).into(),
            Child::Text(Content::Reactive(f)) => {
                let text = Text::new(untrack(|| f()));
                let (t, f) = (text.clone(), Rc::clone(f));
                effects.push(create_effect(move || t.set_data(f())));
                text.into()
            }
        };
        element.append_child(rendered);
    }
    element
}

#[derive(Default)]
struct MountState {
    target: Option<Element>,
    element: Option<Element>,
    effects: Vec<Disposer>,
    effect: Option<Disposer>,
}

/// A mountable instance produced by a [`create_component`] factory.
pub struct ComponentInstance<P: 'static> {
    props: Signal<Rc<P>>,
    render: Rc<dyn Fn(&P) -> VNode>,
    state: Rc<RefCell<MountState>>,
}

impl<P: 'static> ComponentInstance<P> {
    /// Render into `target`. The instance appears at the next flush and is
    /// re-rendered in place whenever its props, or anything its render
    /// function reads, change. Mounting an already mounted instance does
    /// nothing.
    pub fn mount(&self, target: &Element) {
        if self.state.borrow().effect.is_some() {
            return;
        }

        let (props, render_fn, state) = (self.props.clone(), Rc::clone(&self.render), Rc::clone(&self.state));
        let effect = create_effect(move || {
            let props = props.get();
            let vnode = render_fn(&props);

            let stale = std::mem::take(&mut state.borrow_mut().effects);
            for effect in &stale {
                effect.dispose();
            }

            let Rendered { root, effects } = render(&vnode);
            let (target, previous) = {
                let state = state.borrow();
                (state.target.clone(), state.element.clone())
            };
            if let Some(target) = target {
                match previous {
                    Some(previous) => {
                        if !target.replace_child(&previous.into(), root.clone().into()) {
                            target.append_child(root.clone());
                        }
                    }
                    None => target.append_child(root.clone()),
                }
            }
            trace!(effects = effects.len(), "component rendered");

            let mut state = state.borrow_mut();
            state.element = Some(root);
            state.effects = effects;
        });

        let mut state = self.state.borrow_mut();
        state.target = Some(target.clone());
        state.effect = Some(effect);
    }

    /// Dispose every effect of the instance and detach its element.
    pub fn unmount(&self) {
        let (effect, effects, target, element) = {
            let mut state = self.state.borrow_mut();
            (
                state.effect.take(),
                std::mem::take(&mut state.effects),
                state.target.take(),
                state.element.take(),
            )
        };

        if let Some(effect) = effect {
            effect.dispose();
        }
        for effect in &effects {
            effect.dispose();
        }
        if let (Some(target), Some(element)) = (target, element) {
            target.remove_child(&element.into());
        }
    }

    /// Replace the props. A mounted instance re-renders at the next flush.
    pub fn set_props(&self, props: P) {
        self.props.set(Rc::new(props));
    }

    pub fn props(&self) -> Rc<P> {
        self.props.get_untracked()
    }

    pub fn is_mounted(&self) -> bool {
        self.state.borrow().effect.is_some()
    }

    /// The currently rendered element, once the first render has happened.
    pub fn element(&self) -> Option<Element> {
        self.state.borrow().element.clone()
    }
}

impl<P: 'static> fmt::Debug for ComponentInstance<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// Wrap `render_fn` into a factory of mountable instances.
///
/// ```rust
/// use fly_core::dom::Element;
/// use fly_core::reactive::tick;
/// use fly_core::view::{create_component, h, Child, Prop};
///
/// let greeting = create_component(|name: &String| {
///     h("p", [("class", Prop::attr("greeting"))], [Child::from(format!("Hello, {name}"))])
/// });
///
/// let target = Element::new("main");
/// let instance = greeting("Fly".to_string());
/// instance.mount(&target);
/// tick().unwrap();
/// assert_eq!(target.text_content(), "Hello, Fly");
///
/// instance.set_props("you".to_string());
/// tick().unwrap();
/// assert_eq!(target.text_content(), "Hello, you");
/// ```
pub fn create_component<P, R>(render_fn: R) -> impl Fn(P) -> ComponentInstance<P>
where
    P: 'static,
    R: Fn(&P) -> VNode + 'static,
{
    let render_fn: Rc<dyn Fn(&P) -> VNode> = Rc::new(render_fn);
    move |props| ComponentInstance {
        props: Signal::new(Rc::new(props)),
        render: Rc::clone(&render_fn),
        state: Rc::new(RefCell::new(MountState::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_signal, tick};
    use std::cell::Cell;

    #[test]
    fn render_builds_elements_attributes_and_text() {
        let node = h(
            "ul",
            [("class", Prop::attr("list"))],
            [
                Child::from(h("li", Vec::<(String, Prop)>::new(), [Child::from("one")])),
                Child::from(h("li", Vec::<(String, Prop)>::new(), [Child::from("two")])),
            ],
        );

        let rendered = render(&node);
        assert_eq!(rendered.root.tag(), "ul");
        assert_eq!(rendered.root.attribute("class").as_deref(), Some("list"));
        assert_eq!(rendered.root.text_content(), "onetwo");
        assert!(rendered.effects.is_empty());
    }

    #[test]
    fn reactive_text_updates_only_its_node() {
        let count = create_signal(1);
        let c = count.clone();
        let node = h(
            "p",
            Vec::<(String, Prop)>::new(),
            [Child::from("Count: "), text(move || c.get().to_string())],
        );

        let rendered = render(&node);
        assert_eq!(rendered.root.text_content(), "Count: 1");
        let static_child = rendered.root.children()[0].clone();

        tick().unwrap();
        count.set(2);
        tick().unwrap();
        assert_eq!(rendered.root.text_content(), "Count: 2");
        assert!(rendered.root.children()[0].ptr_eq(&static_child));

        let root = rendered.dispose();
        count.set(3);
        tick().unwrap();
        assert_eq!(root.text_content(), "Count: 2");
    }

    #[test]
    fn on_props_become_listeners() {
        let clicks = Rc::new(Cell::new(0));
        let c = clicks.clone();
        let node = h(
            "button",
            [("onClick", Prop::handler(move |_| c.set(c.get() + 1)))],
            [Child::from("+")],
        );

        let button = render(&node).root;
        assert!(!button.has_attribute("onClick"));
        button.dispatch_event(&Event::new("click"));
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn component_mounts_rerenders_and_unmounts() {
        let renders = Rc::new(Cell::new(0));
        let r = renders.clone();
        let counter = create_component(move |n: &i32| {
            r.set(r.get() + 1);
            h("span", Vec::<(String, Prop)>::new(), [Child::from(n.to_string())])
        });

        let target = Element::new("div");
        let instance = counter(1);
        instance.mount(&target);
        assert!(instance.is_mounted());
        assert!(target.children().is_empty());

        tick().unwrap();
        assert_eq!(target.text_content(), "1");
        let first = instance.element().unwrap();

        instance.set_props(2);
        tick().unwrap();
        assert_eq!(target.text_content(), "2");
        assert_eq!(target.children().len(), 1);
        assert!(!instance.element().unwrap().ptr_eq(&first));
        assert_eq!(renders.get(), 2);

        instance.unmount();
        assert!(target.children().is_empty());
        instance.set_props(3);
        tick().unwrap();
        assert_eq!(renders.get(), 2);
    }

    #[test]
    fn rerender_disposes_previous_text_effects() {
        let label = create_signal("a".to_string());
        let l = label.clone();
        let view = create_component(move |_: &()| {
            let l = l.clone();
            h("p", Vec::<(String, Prop)>::new(), [text(move || l.get())])
        });

        let target = Element::new("div");
        let instance = view(());
        instance.mount(&target);
        tick().unwrap();
        assert_eq!(label.subscriber_count(), 1);

        instance.set_props(());
        tick().unwrap();
        assert_eq!(label.subscriber_count(), 1);
        assert_eq!(target.text_content(), "a");

        label.set("b".to_string());
        tick().unwrap();
        assert_eq!(target.text_content(), "b");
    }
}
