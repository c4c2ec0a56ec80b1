//! Keyed State Store
//!
//! A flat map of JSON values, each key created once and then updated in
//! place. Watchers subscribe per key and receive `(new, old)` on every
//! successful [`StateStore::set_state`].
//!
//! The store is not reactive by itself: reading a key inside an effect does
//! not subscribe the effect. Bridge it with a watcher that writes a signal
//! when that is wanted.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StateError;

type Watcher = Rc<dyn Fn(&Value, &Value)>;

#[derive(Default)]
pub struct StateStore {
    state: RefCell<IndexMap<String, Value>>,
    watchers: RefCell<IndexMap<String, Vec<Watcher>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `key` with `initial`. An existing key is left untouched.
    pub fn create_state(&self, key: impl Into<String>, initial: Value) -> Result<(), StateError> {
        let key = key.into();
        let mut state = self.state.borrow_mut();
        if state.contains_key(&key) {
            warn!(key = %key, "state key already exists");
            return Err(StateError::AlreadyExists { key });
        }

        debug!(key = %key, "state created");
        state.insert(key, initial);
        Ok(())
    }

    /// Current value of `key`, or `None` if it was never created.
    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.state.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.borrow().contains_key(key)
    }

    /// Replace the value of an existing key and notify its watchers.
    pub fn set_state(&self, key: &str, value: Value) -> Result<(), StateError> {
        let old = {
            let mut state = self.state.borrow_mut();
            match state.get_mut(key) {
                Some(slot) => std::mem::replace(slot, value.clone()),
                None => {
                    warn!(key, "state key does not exist");
                    return Err(StateError::NotFound {
                        key: key.to_string(),
                    });
                }
            }
        };

        let watchers: Vec<Watcher> = self
            .watchers
            .borrow()
            .get(key)
            .map(|list| list.to_vec())
            .unwrap_or_default();
        for watcher in &watchers {
            watcher(&value, &old);
        }
        Ok(())
    }

    /// Watch `key`. The key does not have to exist yet.
    pub fn subscribe(&self, key: impl Into<String>, watcher: impl Fn(&Value, &Value) + 'static) {
        self.watchers
            .borrow_mut()
            .entry(key.into())
            .or_default()
            .push(Rc::new(watcher));
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &*self.state.borrow())
            .field("watched_keys", &self.watchers.borrow().len())
            .finish()
    }
}
