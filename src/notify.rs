//! Notification mapper.
//!
//! Turns monitor events into platform-agnostic notification requests and
//! hands them to a [`NotificationSender`]. Rendering and platform selection
//! belong to the sender. Delivery failures are logged and swallowed so they
//! can never affect monitoring.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::NotificationConfig;
use crate::error::{ExecutionError, MonitorResult};
use crate::monitor::events::{EventKind, MonitorEvent, Severity};
use crate::monitor::InstanceMonitor;

const NOTIFY_THREAD: &str = "instance-monitor-notify";

/// A notification ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity of the underlying event.
    pub severity: Severity,
    /// Suggested display duration in seconds.
    pub timeout_secs: u32,
}

/// Errors reported by a notification sender.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// No notification backend is usable on this host.
    #[error("Notifications not supported: {reason}")]
    Unsupported {
        /// Why the backend is unavailable.
        reason: String,
    },

    /// The backend failed to show the notification.
    #[error("Notification delivery failed: {message}")]
    DeliveryFailed {
        /// Backend error text.
        message: String,
    },
}

/// Shows notifications. Implementations pick the platform mechanism.
pub trait NotificationSender: Send + Sync {
    /// Show one notification.
    fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError>;
}

/// Sender that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

impl NotificationSender for LogSender {
    fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        match request.severity {
            Severity::Info => info!(title = %request.title, "{}", request.message),
            Severity::Warning => warn!(title = %request.title, "{}", request.message),
            Severity::Error => error!(title = %request.title, "{}", request.message),
        }
        Ok(())
    }
}

/// Filters events by severity and maps them to notification requests.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMapper {
    config: NotificationConfig,
}

impl Default for NotificationMapper {
    fn default() -> Self {
        Self::new(NotificationConfig::default())
    }
}

impl NotificationMapper {
    /// Creates a mapper with the given settings.
    #[must_use]
    pub const fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Maps an event, or returns `None` if it should not be shown.
    #[must_use]
    pub fn map(&self, event: &MonitorEvent) -> Option<NotificationRequest> {
        if !self.config.enabled || event.severity() < self.config.min_severity {
            return None;
        }

        let cfg = &self.config;
        let (title, timeout_secs) = match event.kind() {
            EventKind::StateChange => (
                format!("Instance State: {}", event.instance()),
                cfg.default_timeout_secs,
            ),
            EventKind::IdleWarning => (
                format!("Idle Warning: {}", event.instance()),
                cfg.urgent_timeout_secs,
            ),
            EventKind::CostAlert => ("Cost Alert".to_string(), cfg.urgent_timeout_secs),
            EventKind::TransportError => {
                (format!("{} Error", cfg.app_name), cfg.default_timeout_secs)
            }
            EventKind::InstanceRemoved => (
                format!("Instance Removed: {}", event.instance()),
                cfg.default_timeout_secs,
            ),
        };

        Some(NotificationRequest {
            title,
            message: event.message().to_string(),
            severity: event.severity(),
            timeout_secs,
        })
    }

    /// Maps and sends an event. Returns true if a notification was shown.
    ///
    /// Sender failures are logged, never returned.
    pub fn deliver(&self, event: &MonitorEvent, sender: &dyn NotificationSender) -> bool {
        let Some(request) = self.map(event) else {
            return false;
        };
        match sender.send(&request) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, kind = %event.kind(), "failed to show notification");
                false
            }
        }
    }
}

/// Background consumer that turns a monitor's events into notifications.
#[derive(Debug)]
pub struct Notifier {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Notifier {
    /// Subscribes to `monitor` and starts delivering notifications.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::SpawnFailed` if the worker cannot be created.
    pub fn spawn(
        monitor: &InstanceMonitor,
        mapper: NotificationMapper,
        sender: Arc<dyn NotificationSender>,
    ) -> MonitorResult<Self> {
        let subscription = monitor.subscribe();
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(NOTIFY_THREAD.to_string())
            .spawn(move || {
                debug!(subscription_id = %subscription.id(), "notifier started");
                loop {
                    let next = select! {
                        recv(subscription.receiver()) -> msg => msg.ok(),
                        recv(stop_rx) -> _ => None,
                    };
                    let Some(event) = next else {
                        break;
                    };
                    mapper.deliver(&event, sender.as_ref());
                }
                debug!("notifier stopped");
            })
            .map_err(|e| ExecutionError::SpawnFailed {
                name: NOTIFY_THREAD.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops the worker and unsubscribes.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("notifier worker panicked");
            }
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::snapshot::InstanceState;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<NotificationRequest>>);

    impl NotificationSender for Recorder {
        fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    struct Broken;

    impl NotificationSender for Broken {
        fn send(&self, _request: &NotificationRequest) -> Result<(), NotifyError> {
            Err(NotifyError::Unsupported {
                reason: "headless".to_string(),
            })
        }
    }

    fn permissive() -> NotificationMapper {
        NotificationMapper::new(NotificationConfig {
            min_severity: Severity::Info,
            ..NotificationConfig::default()
        })
    }

    #[test]
    fn default_threshold_drops_info() {
        let mapper = NotificationMapper::default();
        let ev = MonitorEvent::state_change(
            "a",
            InstanceState::Stopped,
            InstanceState::Running,
            Utc::now(),
        );
        assert!(mapper.map(&ev).is_none());

        let ev = MonitorEvent::cost_alert(12.0, 10.0, 2, Utc::now());
        let req = mapper.map(&ev).unwrap();
        assert_eq!(req.title, "Cost Alert");
        assert_eq!(req.timeout_secs, 10);
        assert_eq!(req.severity, Severity::Warning);
    }

    #[test]
    fn titles_follow_event_kind() {
        let mapper = permissive();
        let now = Utc::now();

        let req = mapper
            .map(&MonitorEvent::state_change(
                "web-1",
                InstanceState::Running,
                InstanceState::Stopped,
                now,
            ))
            .unwrap();
        assert_eq!(req.title, "Instance State: web-1");
        assert_eq!(req.timeout_secs, 5);

        let req = mapper.map(&MonitorEvent::idle_warning("web-1", "stop", 40, 45, 4, now)).unwrap();
        assert_eq!(req.title, "Idle Warning: web-1");
        assert_eq!(req.timeout_secs, 10);

        let req = mapper.map(&MonitorEvent::transport_error("timeout", now)).unwrap();
        assert_eq!(req.title, "Instance Monitor Error");
        assert_eq!(req.severity, Severity::Error);

        let req = mapper
            .map(&MonitorEvent::instance_removed("web-1", InstanceState::Stopped, now))
            .unwrap();
        assert_eq!(req.title, "Instance Removed: web-1");
    }

    #[test]
    fn disabled_mapper_maps_nothing() {
        let mapper = NotificationMapper::new(NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        });
        assert!(mapper.map(&MonitorEvent::transport_error("x", Utc::now())).is_none());
    }

    #[test]
    fn deliver_swallows_sender_errors() {
        let mapper = permissive();
        let ev = MonitorEvent::transport_error("x", Utc::now());
        assert!(!mapper.deliver(&ev, &Broken));

        let recorder = Recorder::default();
        assert!(mapper.deliver(&ev, &recorder));
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn log_sender_accepts_everything() {
        let req = NotificationRequest {
            title: "t".to_string(),
            message: "m".to_string(),
            severity: Severity::Error,
            timeout_secs: 5,
        };
        assert!(LogSender.send(&req).is_ok());
    }
}
