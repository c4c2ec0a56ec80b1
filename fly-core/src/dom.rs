//! A minimal in-memory element tree.
//!
//! This stands in for a host document: elements with ordered attributes,
//! children, text nodes and event listeners. Nodes are shared handles, so an
//! effect can hold on to a text node and update it in place.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

/// An event delivered to element listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub detail: Value,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

pub type Listener = Rc<dyn Fn(&Event)>;

struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    children: Vec<Node>,
    listeners: Vec<(String, Listener)>,
}

/// A shared handle to an element.
#[derive(Clone)]
pub struct Element {
    inner: Rc<RefCell<ElementData>>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ElementData {
                tag: tag.into(),
                attributes: IndexMap::new(),
                children: Vec::new(),
                listeners: Vec::new(),
            })),
        }
    }

    /// Builder form of [`Element::set_attribute`].
    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder form of [`Element::append_child`].
    pub fn with_child(self, child: impl Into<Node>) -> Self {
        self.append_child(child);
        self
    }

    pub fn tag(&self) -> String {
        self.inner.borrow().tag.clone()
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .borrow_mut()
            .attributes
            .insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.borrow().attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.borrow().attributes.contains_key(name)
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.inner.borrow_mut().attributes.shift_remove(name)
    }

    /// Attribute name/value pairs in insertion order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn append_child(&self, child: impl Into<Node>) {
        self.inner.borrow_mut().children.push(child.into());
    }

    /// Remove `child` (by identity). Returns whether it was a child.
    pub fn remove_child(&self, child: &Node) -> bool {
        let mut data = self.inner.borrow_mut();
        match data.children.iter().position(|node| node.ptr_eq(child)) {
            Some(index) => {
                data.children.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replace `old` (by identity) with `new` at the same position.
    pub fn replace_child(&self, old: &Node, new: Node) -> bool {
        let mut data = self.inner.borrow_mut();
        match data.children.iter_mut().find(|node| node.ptr_eq(old)) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.borrow().children.clone()
    }

    pub fn child_elements(&self) -> Vec<Element> {
        self.inner
            .borrow()
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element.clone()),
                Node::Text(_) => None,
            })
            .collect()
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&self, text: impl Into<String>) {
        self.inner.borrow_mut().children = vec![Node::Text(Text::new(text))];
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in self.children() {
            match child {
                Node::Text(text) => out.push_str(&text.data()),
                Node::Element(element) => element.collect_text(out),
            }
        }
    }

    pub fn add_event_listener(&self, event: impl Into<String>, listener: impl Fn(&Event) + 'static) {
        self.inner
            .borrow_mut()
            .listeners
            .push((event.into(), Rc::new(listener)));
    }

    /// Invoke every listener registered for `event.name`. Returns how many
    /// listeners ran.
    pub fn dispatch_event(&self, event: &Event) -> usize {
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .filter(|(name, _)| *name == event.name)
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// This element and all descendant elements carrying `attribute`, in
    /// document order.
    pub fn select_with_attribute(&self, attribute: &str) -> Vec<Element> {
        let mut found = Vec::new();
        self.walk(&mut |element| {
            if element.has_attribute(attribute) {
                found.push(element.clone());
            }
        });
        found
    }

    fn walk(&self, visit: &mut dyn FnMut(&Element)) {
        visit(self);
        for child in self.child_elements() {
            child.walk(visit);
        }
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("Element")
            .field("tag", &data.tag)
            .field("attributes", &data.attributes)
            .field("children", &data.children)
            .field("listeners", &data.listeners.len())
            .finish()
    }
}

/// A shared handle to a text node.
#[derive(Clone)]
pub struct Text {
    data: Rc<RefCell<String>>,
}

impl Text {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: Rc::new(RefCell::new(data.into())),
        }
    }

    pub fn data(&self) -> String {
        self.data.borrow().clone()
    }

    pub fn set_data(&self, data: impl Into<String>) {
        *self.data.borrow_mut() = data.into();
    }

    pub fn ptr_eq(&self, other: &Text) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Text").field(&*self.data.borrow()).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(Text),
}

impl Node {
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Element(a), Node::Element(b)) => a.ptr_eq(b),
            (Node::Text(a), Node::Text(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Node::Element(element) => element.text_content(),
            Node::Text(text) => text.data(),
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Text> for Node {
    fn from(text: Text) -> Self {
        Node::Text(text)
    }
}
