//! Change detection per value category.
//!
//! Writing a cell asks the value type whether anything changed. There are
//! two policies and they are deliberately asymmetric:
//!
//! - **Record-like values merge.** The incoming record is merged into the
//!   current one (shallow key union, incoming keys win). The merged result is
//!   a fresh value, so the write always counts as a change, even when it is
//!   structurally identical to what was there before.
//! - **Everything else replaces.** The write is a change only when the new
//!   value is not identical to the current one. Identity is `==` for
//!   primitive-like values and pointer identity for `Rc<T>`.
//!
//! Floats follow IEEE semantics: `NaN` is never identical to itself, so
//! writing `NaN` is always a change.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

/// A value that can live in a cell.
pub trait SignalValue: Clone + 'static {
    /// Strict identity, the check behind "no-op" writes and memo gating.
    fn is_identical(&self, other: &Self) -> bool;

    /// Decide what a write of `incoming` commits.
    ///
    /// Returns `None` when the write is not a change and must not notify
    /// subscribers.
    fn reconcile(current: &Self, incoming: Self) -> Option<Self> {
        if current.is_identical(&incoming) {
            None
        } else {
            Some(incoming)
        }
    }
}

macro_rules! impl_primitive_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SignalValue for $ty {
                #[allow(clippy::float_cmp)]
                fn is_identical(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_primitive_value!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, (),
    String, &'static str,
);

impl<T> SignalValue for Option<T>
where
    T: Clone + PartialEq + 'static,
{
    fn is_identical(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: 'static> SignalValue for Rc<T> {
    fn is_identical(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: Clone + 'static> SignalValue for Vec<T> {
    fn is_identical(&self, _other: &Self) -> bool {
        false
    }
}

impl<K, V, S> SignalValue for IndexMap<K, V, S>
where
    K: Hash + Eq + Clone + 'static,
    V: Clone + 'static,
    S: BuildHasher + Clone + 'static,
{
    fn is_identical(&self, _other: &Self) -> bool {
        false
    }

    fn reconcile(current: &Self, incoming: Self) -> Option<Self> {
        let mut merged = current.clone();
        merged.extend(incoming);
        Some(merged)
    }
}

impl<K, V, S> SignalValue for HashMap<K, V, S>
where
    K: Hash + Eq + Clone + 'static,
    V: Clone + 'static,
    S: BuildHasher + Clone + 'static,
{
    fn is_identical(&self, _other: &Self) -> bool {
        false
    }

    fn reconcile(current: &Self, incoming: Self) -> Option<Self> {
        let mut merged = current.clone();
        merged.extend(incoming);
        Some(merged)
    }
}

impl<K, V> SignalValue for BTreeMap<K, V>
where
    K: Ord + Clone + 'static,
    V: Clone + 'static,
{
    fn is_identical(&self, _other: &Self) -> bool {
        false
    }

    fn reconcile(current: &Self, incoming: Self) -> Option<Self> {
        let mut merged = current.clone();
        merged.extend(incoming);
        Some(merged)
    }
}

impl SignalValue for Value {
    fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Object(_), _) | (Value::Array(_), _) => false,
            _ => self == other,
        }
    }

    fn reconcile(current: &Self, incoming: Self) -> Option<Self> {
        match (current, incoming) {
            (Value::Object(current), Value::Object(incoming)) => {
                let mut merged = current.clone();
                merged.extend(incoming);
                Some(Value::Object(merged))
            }
            (_, incoming @ (Value::Object(_) | Value::Array(_))) => Some(incoming),
            (current, incoming) => (!current.is_identical(&incoming)).then_some(incoming),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_replace_only_when_different() {
        assert_eq!(i32::reconcile(&1, 1), None);
        assert_eq!(i32::reconcile(&1, 2), Some(2));
        assert_eq!(String::reconcile(&"a".to_string(), "a".to_string()), None);
    }

    #[test]
    fn nan_is_always_a_change() {
        assert!(f64::reconcile(&f64::NAN, f64::NAN).is_some());
        assert_eq!(f64::reconcile(&0.5, 0.5), None);
    }

    #[test]
    fn rc_compares_by_pointer() {
        let a = Rc::new(5);
        let b = Rc::new(5);
        assert!(Rc::reconcile(&a, a.clone()).is_none());
        assert!(Rc::reconcile(&a, b).is_some());
    }

    #[test]
    fn maps_merge_and_always_change() {
        let current: IndexMap<&str, i32> = IndexMap::from([("a", 1)]);

        let merged = IndexMap::reconcile(&current, IndexMap::from([("b", 2)])).unwrap();
        assert_eq!(merged, IndexMap::from([("a", 1), ("b", 2)]));

        let same = IndexMap::reconcile(&current, IndexMap::from([("a", 1)]));
        assert_eq!(same, Some(current.clone()));
    }

    #[test]
    fn incoming_keys_win_on_merge() {
        let current: BTreeMap<&str, i32> = BTreeMap::from([("a", 1), ("b", 1)]);
        let merged = BTreeMap::reconcile(&current, BTreeMap::from([("b", 9)])).unwrap();
        assert_eq!(merged, BTreeMap::from([("a", 1), ("b", 9)]));
    }

    #[test]
    fn json_objects_merge_and_scalars_compare() {
        let merged = Value::reconcile(&json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, Some(json!({"a": 1, "b": 2})));

        assert_eq!(
            Value::reconcile(&json!({"a": 1}), json!({"a": 1})),
            Some(json!({"a": 1}))
        );
        assert_eq!(Value::reconcile(&json!(3), json!(3)), None);
        assert_eq!(Value::reconcile(&json!(null), json!(null)), None);
        assert_eq!(Value::reconcile(&json!(3), json!({"a": 1})), Some(json!({"a": 1})));
        assert_eq!(Value::reconcile(&json!({"a": 1}), json!(4)), Some(json!(4)));
    }

    #[test]
    fn vectors_always_replace() {
        assert_eq!(Vec::reconcile(&vec![1], vec![1]), Some(vec![1]));
    }
}
