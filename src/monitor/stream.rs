use std::sync::Weak;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::{ExecutionError, MonitorError, MonitorResult};

use super::events::{MonitorEvent, SubscriptionId};
use super::registry::SubscriberRegistry;

const STREAM_PATH: &str = "subscription";

/// A subscription to monitor events.
///
/// Events arrive in the order the monitor produced them. A subscriber that
/// stops reading simply misses events once its buffer is full; it never
/// slows the monitor or other subscribers down.
///
/// `unsubscribe` consumes the handle, so it cannot be used afterwards.
/// Dropping the handle unsubscribes as well.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: Receiver<MonitorEvent>,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        rx: Receiver<MonitorEvent>,
        registry: Weak<SubscriberRegistry>,
    ) -> Self {
        Self { id, rx, registry }
    }

    /// The subscription id.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the subscription and closes its channel.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Receive the next event (blocking).
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Disconnected` once the monitor has been dropped.
    pub fn recv(&self) -> MonitorResult<MonitorEvent> {
        self.rx.recv().map_err(|_| disconnected())
    }

    /// Receive the next event with a timeout.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Timeout` if nothing arrived in time and
    /// `ExecutionError::Disconnected` if the channel is closed.
    pub fn recv_timeout(&self, timeout: Duration) -> MonitorResult<MonitorEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => MonitorError::Execution(ExecutionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => disconnected(),
        })
    }

    /// Receive an event if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Disconnected` if the channel is closed and empty.
    pub fn try_recv(&self) -> MonitorResult<Option<MonitorEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(disconnected()),
        }
    }

    /// Takes every buffered event without blocking.
    pub fn drain(&self) -> Vec<MonitorEvent> {
        self.rx.try_iter().collect()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub(crate) const fn receiver(&self) -> &Receiver<MonitorEvent> {
        &self.rx
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The registry may already be gone with its monitor.
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

fn disconnected() -> MonitorError {
    MonitorError::Execution(ExecutionError::Disconnected {
        path: STREAM_PATH.to_string(),
    })
}
