//! Shared event queue.
//!
//! Producers enqueue with a non-blocking `try_send`. When the queue is full
//! the newest event is dropped and counted; a poll cycle never waits on the
//! dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use super::events::MonitorEvent;

/// Counters shared by the queue, dispatcher and poll loop.
#[derive(Debug, Default)]
pub(crate) struct BusCounters {
    pub(crate) cycles: AtomicU64,
    pub(crate) fetch_failures: AtomicU64,
    pub(crate) published: AtomicU64,
    pub(crate) queue_dropped: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) delivery_dropped: AtomicU64,
}

impl BusCounters {
    pub(crate) fn snapshot(&self) -> MonitorStats {
        MonitorStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            events_published: self.published.load(Ordering::Relaxed),
            queue_dropped: self.queue_dropped.load(Ordering::Relaxed),
            deliveries: self.delivered.load(Ordering::Relaxed),
            delivery_dropped: self.delivery_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the monitor's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Completed refresh cycles, seed included.
    pub cycles: u64,
    /// Refresh cycles whose fetch failed.
    pub fetch_failures: u64,
    /// Events accepted by the queue.
    pub events_published: u64,
    /// Events dropped because the queue was full.
    pub queue_dropped: u64,
    /// Successful per-subscriber deliveries.
    pub deliveries: u64,
    /// Per-subscriber deliveries skipped because that subscriber's buffer was full.
    pub delivery_dropped: u64,
}

/// Producer handle for the event queue.
#[derive(Debug, Clone)]
pub(crate) struct EventPublisher {
    tx: Sender<MonitorEvent>,
    capacity: usize,
    counters: Arc<BusCounters>,
}

impl EventPublisher {
    /// Creates a queue and returns its producer and consumer ends.
    pub(crate) fn channel(
        capacity: usize,
        counters: Arc<BusCounters>,
    ) -> (Self, Receiver<MonitorEvent>) {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded::<MonitorEvent>(capacity);
        (Self { tx, capacity, counters }, rx)
    }

    /// Non-blocking enqueue. Returns false if the event was dropped.
    pub(crate) fn publish(&self, event: MonitorEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event)) => {
                self.counters.queue_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = %event.kind(),
                    instance = event.instance(),
                    capacity = self.capacity,
                    "event queue full, dropped event"
                );
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                self.counters.queue_dropped.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %event.kind(), "event queue closed, dropped event");
                false
            }
        }
    }

    /// Enqueues events in order, returning how many were accepted.
    pub(crate) fn publish_all(&self, events: Vec<MonitorEvent>) -> usize {
        let mut accepted = 0;
        for event in events {
            if self.publish(event) {
                accepted += 1;
            }
        }
        accepted
    }
}
