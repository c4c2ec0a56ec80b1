//! Identities on both ends of a subscription.
//!
//! A subscription is a many-to-many edge between a cell (a *source*) and an
//! effect (a *subscriber*). Cells store the ids of their subscribers; effects
//! store weak handles to the sources they read during their last run so they
//! can unsubscribe from the ones they stopped reading.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Every effect, including the ones owned by computed values and memos, gets
/// a unique id when created. Ids are what the scheduler's pending set and the
/// cells' subscriber sets hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// The type-erased side of a cell that an effect needs to manage its
/// subscriptions.
pub(crate) trait Source {
    fn source_id(&self) -> SourceId;

    /// Remove `subscriber` from this cell's subscriber set. Removing an id
    /// that is not subscribed is a no-op.
    fn unsubscribe(&self, subscriber: SubscriberId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn source_ids_are_unique_and_ordered() {
        let a = SourceId::new();
        let b = SourceId::new();
        assert_ne!(a, b);
        assert!(a < b);
    }
}
