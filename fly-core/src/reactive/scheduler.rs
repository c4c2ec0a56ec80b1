//! Update Scheduler
//!
//! The scheduler owns the pending set of subscribers and the single
//! "flush scheduled" flag. It decides *when* subscribers run, never *what*
//! they do: the runtime hands it a callback that executes one subscriber.
//!
//! # Algorithm
//!
//! 1. `enqueue` inserts a subscriber into the pending set. Inserting one that
//!    is already pending is a no-op and keeps its original position.
//! 2. The first enqueue after a flush marks a flush as scheduled. Any number
//!    of further writes before the host yields coalesce into that one flush.
//! 3. `flush` repeatedly takes the oldest pending subscriber and runs it.
//!    The queue is a FIFO of tickets; each subscriber's live ticket sits in
//!    the pending map, so dequeue and cancel are both constant time and a
//!    cancelled entry is skipped when it reaches the front.
//!    Subscribers enqueued while the flush is running are appended and run in
//!    the same pass, so the graph settles fully before control returns.
//!    A subscriber that already ran in this pass and is enqueued again runs
//!    again.
//! 4. However the flush ends (completion, limit, or a panicking subscriber),
//!    a drop guard clears the pending set and both flags. A failed flush can
//!    therefore never leave the scheduler unable to schedule again.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::{debug, error, trace};

use super::subscriber::SubscriberId;
use crate::error::ReactiveError;

/// Pending set plus flush bookkeeping for one runtime.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    queue: RefCell<VecDeque<(SubscriberId, u64)>>,
    pending: RefCell<IndexMap<SubscriberId, u64>>,
    next_ticket: Cell<u64>,
    scheduled: Cell<bool>,
    flushing: Cell<bool>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `subscriber` to the pending set and request a flush.
    ///
    /// Returns `false` when the subscriber was already pending.
    pub(crate) fn enqueue(&self, subscriber: SubscriberId) -> bool {
        let inserted = {
            let mut pending = self.pending.borrow_mut();
            if pending.contains_key(&subscriber) {
                false
            } else {
                let ticket = self.next_ticket.get();
                self.next_ticket.set(ticket.wrapping_add(1));
                pending.insert(subscriber, ticket);
                self.queue.borrow_mut().push_back((subscriber, ticket));
                true
            }
        };
        if !self.scheduled.replace(true) {
            trace!("flush scheduled");
        }
        if inserted {
            trace!(?subscriber, "subscriber enqueued");
        }
        inserted
    }

    /// Drop `subscriber` from the pending set if it has not run yet.
    pub(crate) fn cancel(&self, subscriber: SubscriberId) -> bool {
        self.pending.borrow_mut().swap_remove(&subscriber).is_some()
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, subscriber: SubscriberId) -> bool {
        self.pending.borrow().contains_key(&subscriber)
    }

    /// Take the oldest entry whose ticket is still live.
    fn dequeue(&self) -> Option<SubscriberId> {
        let mut queue = self.queue.borrow_mut();
        let mut pending = self.pending.borrow_mut();
        while let Some((subscriber, ticket)) = queue.pop_front() {
            if pending.get(&subscriber) == Some(&ticket) {
                pending.swap_remove(&subscriber);
                return Some(subscriber);
            }
        }
        None
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.scheduled.get()
    }

    pub(crate) fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    /// Run every pending subscriber, including ones enqueued along the way.
    ///
    /// Returns the number of subscriber runs. Calling `flush` when nothing is
    /// scheduled, or re-entrantly from inside a running subscriber, does
    /// nothing and returns `Ok(0)`.
    pub(crate) fn flush<F>(&self, limit: usize, mut run: F) -> Result<usize, ReactiveError>
    where
        F: FnMut(SubscriberId),
    {
        if self.flushing.get() || !self.scheduled.get() {
            return Ok(0);
        }

        self.flushing.set(true);
        let _reset = FlushReset { scheduler: self };

        let mut runs = 0;
        loop {
            let Some(subscriber) = self.dequeue() else {
                break;
            };

            if runs == limit {
                error!(limit, "flush limit exceeded, dropping pending subscribers");
                return Err(ReactiveError::FlushLimitExceeded { limit });
            }

            runs += 1;
            trace!(?subscriber, "running subscriber");
            run(subscriber);
        }

        debug!(runs, "flush complete");
        Ok(runs)
    }
}

/// Resets the scheduler on every exit path out of `flush`, unwinding included.
struct FlushReset<'a> {
    scheduler: &'a Scheduler,
}

impl Drop for FlushReset<'_> {
    fn drop(&mut self) {
        self.scheduler.queue.borrow_mut().clear();
        self.scheduler.pending.borrow_mut().clear();
        self.scheduler.scheduled.set(false);
        self.scheduler.flushing.set(false);
    }
}
