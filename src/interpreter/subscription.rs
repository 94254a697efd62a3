//! Snapshot subscribers.

use super::snapshot::Snapshot;
use crate::core::State;
use std::sync::{Arc, Weak};

/// Callback receiving every published snapshot.
pub(crate) type Listener<S, C> = Arc<dyn Fn(&Snapshot<S, C>) + Send + Sync>;

/// Something a [`Subscription`] can detach itself from.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

/// Registered listeners, in subscription order.
pub(crate) struct Subscribers<S: State, C> {
    next_id: u64,
    listeners: Vec<(u64, Listener<S, C>)>,
}

impl<S: State, C> Subscribers<S, C> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, listener: Listener<S, C>) -> u64 {
        self.next_id += 1;
        self.listeners.push((self.next_id, listener));
        self.next_id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Listeners to notify for one snapshot, detached from the lock.
    pub(crate) fn listeners(&self) -> Vec<Listener<S, C>> {
        self.listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

/// Handle returned by `Interpreter::subscribe`.
///
/// Dropping the handle keeps the subscription alive; call
/// [`unsubscribe`](Subscription::unsubscribe) to stop receiving snapshots.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    owner: Weak<dyn Detach>,
}

impl Subscription {
    pub(crate) fn new(id: u64, owner: Weak<dyn Detach>) -> Self {
        Self { id, owner }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop receiving snapshots. A no-op if the interpreter is gone.
    pub fn unsubscribe(self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(self.id);
        }
    }
}
