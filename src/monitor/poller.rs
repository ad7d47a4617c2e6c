//! Instance monitor: polling loop and lifecycle.
//!
//! `start` seeds the state store with one synchronous refresh and only then
//! spawns two workers: the poll loop, driven by a ticker, and the
//! dispatcher. `stop` cancels the poll loop, closes the event queue and
//! joins both workers before returning.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{ExecutionError, MonitorError, MonitorResult, TransportError};
use crate::snapshot::{FetchContext, InstanceState, SnapshotSource};

use super::diff::{diff_snapshot, DiffSettings};
use super::dispatcher;
use super::events::MonitorEvent;
use super::queue::{BusCounters, EventPublisher, MonitorStats};
use super::registry::SubscriberRegistry;
use super::state::MonitorState;
use super::stream::Subscription;

const POLL_THREAD: &str = "instance-monitor-poll";

/// State shared between the caller and the poll worker.
struct Shared {
    source: Arc<dyn SnapshotSource>,
    config: MonitorConfig,
    settings: DiffSettings,
    state: Mutex<MonitorState>,
    counters: Arc<BusCounters>,
}

impl Shared {
    /// One refresh cycle: fetch without holding any lock, diff under the
    /// state lock, then enqueue the events in order.
    fn refresh(
        &self,
        publisher: &EventPublisher,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<usize, TransportError> {
        let ctx = FetchContext::new(self.config.fetch_timeout(), Arc::clone(cancelled));
        let snapshot = match self.source.list_instances(&ctx) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let events = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            diff_snapshot(&mut state, &snapshot, &self.settings, Utc::now())
        };

        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
        let produced = events.len();
        let accepted = publisher.publish_all(events);
        debug!(instances = snapshot.len(), produced, accepted, "refresh cycle complete");
        Ok(produced)
    }
}

/// Handles of a running monitor.
struct Running {
    publisher: EventPublisher,
    cancelled: Arc<AtomicBool>,
    shutdown_tx: Sender<()>,
    poll: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

/// Periodically samples instances and distributes change events.
///
/// The monitor owns its state store, so several monitors can run side by
/// side. Subscriptions may be taken at any time; each one only sees events
/// dispatched after it was created.
pub struct InstanceMonitor {
    shared: Arc<Shared>,
    registry: Arc<SubscriberRegistry>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for InstanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceMonitor")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .field("subscribers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl InstanceMonitor {
    /// Creates a stopped monitor.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Validation` if `config` is invalid.
    pub fn new(source: Arc<dyn SnapshotSource>, config: MonitorConfig) -> MonitorResult<Self> {
        config.validate()?;
        let registry = Arc::new(SubscriberRegistry::new(config.subscriber_capacity));
        let shared = Arc::new(Shared {
            source,
            settings: DiffSettings::from(&config),
            config,
            state: Mutex::new(MonitorState::new()),
            counters: Arc::new(BusCounters::default()),
        });
        Ok(Self {
            shared,
            registry,
            running: Mutex::new(None),
        })
    }

    /// Creates a stopped monitor from a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Config` if the file cannot be read, parsed or
    /// validated.
    pub fn from_config_file(
        source: Arc<dyn SnapshotSource>,
        path: impl AsRef<Path>,
    ) -> MonitorResult<Self> {
        let config = MonitorConfig::from_json_file(path)?;
        Self::new(source, config)
    }

    /// Seeds the state store and starts the poll and dispatch workers.
    ///
    /// Events produced by the seed refresh (idle warnings, cost alerts) are
    /// delivered once the dispatcher is up.
    ///
    /// The lifecycle lock is held for the whole seed fetch, which may take up
    /// to `fetch_timeout_secs`. Concurrent `is_running`, `stop` and
    /// `refresh_now` calls wait for `start` to finish and then observe its
    /// outcome.
    ///
    /// # Errors
    ///
    /// - `ExecutionError::AlreadyRunning` if the monitor is running.
    /// - `MonitorError::Startup` if the seed fetch fails; nothing is spawned.
    /// - `ExecutionError::SpawnFailed` if a worker thread cannot be created.
    pub fn start(&self) -> MonitorResult<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(ExecutionError::AlreadyRunning.into());
        }

        let (publisher, queue_rx) = EventPublisher::channel(
            self.shared.config.queue_capacity,
            Arc::clone(&self.shared.counters),
        );
        let cancelled = Arc::new(AtomicBool::new(false));

        self.shared
            .refresh(&publisher, &cancelled)
            .map_err(MonitorError::Startup)?;

        let dispatch = dispatcher::spawn(
            queue_rx,
            Arc::clone(&self.registry),
            Arc::clone(&self.shared.counters),
        )?;

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let spawned = self.spawn_poll_loop(publisher.clone(), Arc::clone(&cancelled), shutdown_rx);
        let poll = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                // Close the queue so the dispatcher exits.
                drop(publisher);
                let _ = dispatch.join();
                return Err(e);
            }
        };

        *running = Some(Running {
            publisher,
            cancelled,
            shutdown_tx,
            poll,
            dispatch,
        });
        info!(
            interval_secs = self.shared.config.poll_interval_secs,
            "instance monitor started"
        );
        Ok(())
    }

    fn spawn_poll_loop(
        &self,
        publisher: EventPublisher,
        cancelled: Arc<AtomicBool>,
        shutdown_rx: Receiver<()>,
    ) -> MonitorResult<JoinHandle<()>> {
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(POLL_THREAD.to_string())
            .spawn(move || poll_loop(&shared, &publisher, &cancelled, &shutdown_rx))
            .map_err(|e| {
                ExecutionError::SpawnFailed {
                    name: POLL_THREAD.to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Stops both workers and waits for them. No-op when not running.
    ///
    /// Events already queued are still delivered before this returns.
    pub fn stop(&self) {
        let taken = self.running.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(running) = taken else {
            return;
        };

        let Running {
            publisher,
            cancelled,
            shutdown_tx,
            poll,
            dispatch,
        } = running;

        cancelled.store(true, Ordering::Release);
        drop(shutdown_tx);
        if poll.join().is_err() {
            warn!("poll worker panicked");
        }

        // Last sender: the dispatcher drains what is queued, then exits.
        drop(publisher);
        if dispatch.join().is_err() {
            warn!("dispatch worker panicked");
        }
        info!("instance monitor stopped");
    }

    /// True between a successful `start` and the next `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Subscribes to events dispatched from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Runs one refresh cycle immediately, outside the ticker.
    ///
    /// Returns the number of events produced. Unlike the periodic loop, a
    /// fetch failure is returned to the caller rather than published.
    ///
    /// # Errors
    ///
    /// `ExecutionError::NotRunning` if stopped, or the fetch error.
    pub fn refresh_now(&self) -> MonitorResult<usize> {
        let (publisher, cancelled) = {
            let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(running) = running.as_ref() else {
                return Err(ExecutionError::NotRunning.into());
            };
            (running.publisher.clone(), Arc::clone(&running.cancelled))
        };
        Ok(self.shared.refresh(&publisher, &cancelled)?)
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> MonitorStats {
        self.shared.counters.snapshot()
    }

    /// Last-observed `(id, state)` pairs, sorted by id.
    #[must_use]
    pub fn tracked_instances(&self) -> Vec<(String, InstanceState)> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries()
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }
}

impl Drop for InstanceMonitor {
    fn drop(&mut self) {
        self.stop();
        // Wake subscribers blocked in recv.
        self.registry.close_all();
    }
}

fn poll_loop(
    shared: &Shared,
    publisher: &EventPublisher,
    cancelled: &Arc<AtomicBool>,
    shutdown_rx: &Receiver<()>,
) {
    let ticker = tick(shared.config.poll_interval());
    loop {
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        let shutdown = select! {
            recv(shutdown_rx) -> _ => true,
            recv(ticker) -> _ => false,
        };
        // Checked again: both channels may be ready at once.
        if shutdown || cancelled.load(Ordering::Acquire) {
            break;
        }

        match shared.refresh(publisher, cancelled) {
            Ok(_) => {}
            Err(TransportError::Cancelled) if cancelled.load(Ordering::Acquire) => break,
            Err(e) => {
                warn!(error = %e, "instance refresh failed");
                publisher.publish(MonitorEvent::transport_error(&e, Utc::now()));
            }
        }
    }
    debug!("poll loop stopped");
}
