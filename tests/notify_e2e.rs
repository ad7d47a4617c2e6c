mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use instance_monitor::{
    EventKind, IdleDetection, InstanceSnapshot, InstanceState, NotificationConfig,
    NotificationMapper, NotificationRequest, NotificationSender, Notifier, NotifyError, Severity,
};

use common::{manual_config, monitor, recv_n, wait_for, ScriptedSource};

#[derive(Default)]
struct Recorder(Mutex<Vec<NotificationRequest>>);

impl Recorder {
    fn titles(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|r| r.title.clone()).collect()
    }
}

impl NotificationSender for Recorder {
    fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(request.clone());
        Ok(())
    }
}

struct AlwaysFails;

impl NotificationSender for AlwaysFails {
    fn send(&self, _request: &NotificationRequest) -> Result<(), NotifyError> {
        Err(NotifyError::DeliveryFailed {
            message: "notify-send not found".to_string(),
        })
    }
}

#[test]
fn notifier_forwards_warnings_and_skips_info() {
    let source = ScriptedSource::new(vec![
        Ok(vec![InstanceSnapshot::new("web", InstanceState::Stopped)]),
        Ok(vec![InstanceSnapshot::new("web", InstanceState::Running)
            .with_cost(40.0)
            .with_idle(IdleDetection::enabled("stop").pending_in(2))]),
    ]);
    let monitor = monitor(&source, manual_config());
    let recorder = Arc::new(Recorder::default());
    let notifier =
        Notifier::spawn(&monitor, NotificationMapper::default(), recorder.clone()).unwrap();

    monitor.start().unwrap();
    monitor.refresh_now().unwrap();

    assert!(wait_for(|| recorder.titles().len() == 2));
    assert_eq!(recorder.titles(), ["Idle Warning: web", "Cost Alert"]);
    let requests = recorder.0.lock().unwrap().clone();
    assert_eq!(requests[0].severity, Severity::Warning);
    assert_eq!(requests[0].timeout_secs, 10);
    assert!(requests[0].message.contains("stop in 2 minutes"));

    notifier.stop();
    assert_eq!(monitor.subscriber_count(), 0);
}

#[test]
fn info_threshold_includes_state_changes() {
    let source = ScriptedSource::new(vec![
        Ok(vec![InstanceSnapshot::new("db", InstanceState::Running)]),
        Ok(vec![InstanceSnapshot::new("db", InstanceState::Stopping)]),
    ]);
    let monitor = monitor(&source, manual_config());
    let recorder = Arc::new(Recorder::default());
    let mapper = NotificationMapper::new(NotificationConfig {
        min_severity: Severity::Info,
        ..NotificationConfig::default()
    });
    let _notifier = Notifier::spawn(&monitor, mapper, recorder.clone()).unwrap();

    monitor.start().unwrap();
    monitor.refresh_now().unwrap();
    assert!(wait_for(|| recorder.titles() == ["Instance State: db"]));
}

#[test]
fn failing_sender_does_not_disturb_monitoring() {
    let source = ScriptedSource::new(vec![
        Ok(vec![InstanceSnapshot::new("a", InstanceState::Running).with_cost(99.0)]),
        Ok(vec![InstanceSnapshot::new("a", InstanceState::Stopped).with_cost(99.0)]),
    ]);
    let monitor = monitor(&source, manual_config());
    let other = monitor.subscribe();
    let sender = Arc::new(AlwaysFails);
    let notifier = Notifier::spawn(&monitor, NotificationMapper::default(), sender).unwrap();

    monitor.start().unwrap();
    monitor.refresh_now().unwrap();

    let kinds: Vec<EventKind> = recv_n(&other, 3).iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, [EventKind::CostAlert, EventKind::StateChange, EventKind::CostAlert]);
    assert!(monitor.is_running());

    notifier.stop();
    monitor.stop();
    assert!(other.recv_timeout(Duration::from_millis(50)).is_err());
}
