//! Subscriber registry.
//!
//! A reader/writer-locked list of bounded subscriber channels. The
//! dispatcher takes the read lock once per event to copy the current
//! targets; subscribe and unsubscribe take the write lock. Sends always
//! happen after the lock is released.

use std::sync::{Arc, PoisonError, RwLock};

use crossbeam_channel::{bounded, Sender};
use tracing::debug;

use super::events::{MonitorEvent, SubscriptionId};
use super::stream::Subscription;

#[derive(Debug)]
struct SubscriberEntry {
    id: SubscriptionId,
    tx: Sender<MonitorEvent>,
}

/// Registry of live subscriptions.
#[derive(Debug)]
pub struct SubscriberRegistry {
    entries: RwLock<Vec<SubscriberEntry>>,
    capacity: usize,
}

impl SubscriberRegistry {
    /// Creates an empty registry whose channels hold `capacity` events each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Per-subscriber channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registers a new subscriber. It only sees events dispatched from now on.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriptionId::new();
        let (tx, rx) = bounded::<MonitorEvent>(self.capacity);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SubscriberEntry { id, tx });
        debug!(subscription_id = %id, "subscriber added");
        Subscription::new(id, rx, Arc::downgrade(self))
    }

    /// Removes a subscriber. Its channel disconnects once the registry's sender is dropped.
    ///
    /// Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .position(|e| e.id == id)
                .map(|idx| entries.remove(idx))
        };
        match removed {
            Some(entry) => {
                drop(entry);
                debug!(subscription_id = %id, "subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Copies the current targets under the read lock.
    pub(crate) fn targets(&self) -> Vec<(SubscriptionId, Sender<MonitorEvent>)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| (e.id, e.tx.clone()))
            .collect()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every subscriber, disconnecting their channels.
    pub fn close_all(&self) {
        let drained: Vec<SubscriberEntry> = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "closed all subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn subscribe_and_unsubscribe_update_len() {
        let registry = Arc::new(SubscriberRegistry::new(4));
        let a = registry.subscribe();
        let b = registry.subscribe();
        assert_eq!(registry.len(), 2);

        assert!(registry.unsubscribe(a.id()));
        assert!(!registry.unsubscribe(a.id()));
        assert_eq!(registry.len(), 1);

        b.unsubscribe();
        assert!(registry.is_empty());
    }

    #[test]
    fn targets_reach_live_subscribers() {
        let registry = Arc::new(SubscriberRegistry::new(4));
        let sub = registry.subscribe();
        for (_, tx) in registry.targets() {
            tx.try_send(MonitorEvent::transport_error("x", Utc::now())).unwrap();
        }
        assert!(sub.try_recv().unwrap().is_some());
    }

    #[test]
    fn close_all_disconnects() {
        let registry = Arc::new(SubscriberRegistry::new(4));
        let sub = registry.subscribe();
        registry.close_all();
        assert!(registry.is_empty());
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(SubscriberRegistry::new(0).capacity(), 1);
    }
}
