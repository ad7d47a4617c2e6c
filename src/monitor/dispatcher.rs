//! Event dispatcher worker.
//!
//! Drains the shared event queue and fans each event out to every
//! registered subscriber with a non-blocking `try_send`. A full subscriber
//! misses that event; delivery is best-effort and at-most-once. The worker
//! exits once every queue sender has been dropped and the queue is empty.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TrySendError};
use tracing::{debug, trace, warn};

use crate::error::{ExecutionError, MonitorResult};

use super::events::MonitorEvent;
use super::queue::BusCounters;
use super::registry::SubscriberRegistry;

pub(crate) const DISPATCH_THREAD: &str = "instance-monitor-dispatch";

/// Spawns the dispatcher thread.
pub(crate) fn spawn(
    queue_rx: Receiver<MonitorEvent>,
    registry: Arc<SubscriberRegistry>,
    counters: Arc<BusCounters>,
) -> MonitorResult<JoinHandle<()>> {
    thread::Builder::new()
        .name(DISPATCH_THREAD.to_string())
        .spawn(move || dispatch_loop(&queue_rx, &registry, &counters))
        .map_err(|e| {
            ExecutionError::SpawnFailed {
                name: DISPATCH_THREAD.to_string(),
                message: e.to_string(),
            }
            .into()
        })
}

fn dispatch_loop(
    queue_rx: &Receiver<MonitorEvent>,
    registry: &SubscriberRegistry,
    counters: &BusCounters,
) {
    debug!("dispatcher started");
    while let Ok(event) = queue_rx.recv() {
        dispatch_one(&event, registry, counters);
    }
    debug!("dispatcher stopped");
}

/// Delivers one event to every current subscriber.
pub(crate) fn dispatch_one(
    event: &MonitorEvent,
    registry: &SubscriberRegistry,
    counters: &BusCounters,
) {
    // Targets are copied under the read lock; sends happen without it.
    let targets = registry.targets();
    trace!(kind = %event.kind(), subscribers = targets.len(), "dispatching event");

    for (id, tx) in targets {
        match tx.try_send(event.clone()) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                counters.delivery_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subscription_id = %id,
                    kind = %event.kind(),
                    "subscriber buffer full, dropped event"
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                // Unsubscribed after the targets were copied.
                trace!(subscription_id = %id, "subscriber gone");
            }
        }
    }
}
