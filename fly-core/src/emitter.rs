//! Named-event publish/subscribe.
//!
//! An [`Emitter`] maps event names to ordered handler lists. Handlers are
//! identified by the [`ListenerId`] returned from [`Emitter::on`], which is
//! what [`Emitter::off`] takes to remove them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

/// Identifies a handler registered on an [`Emitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler<P> = Rc<dyn Fn(&P)>;

/// Single-threaded event emitter carrying payloads of type `P`.
pub struct Emitter<P> {
    handlers: RefCell<IndexMap<String, Vec<(ListenerId, Handler<P>)>>>,
    next_id: Cell<u64>,
}

impl<P> Emitter<P> {
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(IndexMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Register `handler` for `event`. Handlers run in registration order.
    pub fn on(&self, event: impl Into<String>, handler: impl Fn(&P) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        self.handlers
            .borrow_mut()
            .entry(event.into())
            .or_default()
            .push((id, Rc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered for `event`.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let Some(list) = handlers.get_mut(event) else {
            return false;
        };

        let before = list.len();
        list.retain(|(listener, _)| *listener != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.shift_remove(event);
        }
        removed
    }

    /// Call every handler of `event` with `payload` and return how many ran.
    ///
    /// The handler list is snapshotted first, so handlers may call `on` or
    /// `off` on this emitter. Such changes take effect from the next emit.
    pub fn emit(&self, event: &str, payload: &P) -> usize {
        let snapshot: Vec<Handler<P>> = match self.handlers.borrow().get(event) {
            Some(list) => list.iter().map(|(_, handler)| Rc::clone(handler)).collect(),
            None => return 0,
        };

        trace!(event, handlers = snapshot.len(), "emit");
        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.handlers.borrow().get(event).map_or(0, Vec::len)
    }
}

impl<P> Default for Emitter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Emitter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.borrow();
        let mut map = f.debug_map();
        for (event, list) in handlers.iter() {
            map.entry(event, &list.len());
        }
        map.finish()
    }
}
