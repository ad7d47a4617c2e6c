//! Instance monitor and its event-distribution bus.
//!
//! A poll worker samples the snapshot source on a fixed interval and runs the
//! diff engine against the monitor's state store. Resulting events go
//! through one bounded queue to a dispatcher worker, which fans them out to
//! bounded per-subscriber channels. Neither a slow subscriber nor a full
//! queue can block a poll cycle.

/// Diff engine.
pub mod diff;
/// Event dispatch worker.
mod dispatcher;
/// Event and id types.
pub mod events;
/// Polling loop and lifecycle.
pub mod poller;
/// Shared event queue and counters.
mod queue;
/// Subscriber registry.
pub mod registry;
/// Last-observed instance state.
pub mod state;
/// Subscriber handle.
pub mod stream;

pub use diff::{diff_snapshot, DiffSettings};
pub use events::{EventKind, EventPayload, MonitorEvent, Severity, SubscriptionId};
pub use poller::InstanceMonitor;
pub use queue::MonitorStats;
pub use registry::SubscriberRegistry;
pub use state::{IdleRecord, MonitorState};
pub use stream::Subscription;
