#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use instance_monitor::{
    FetchContext, InstanceMonitor, InstanceSnapshot, MonitorConfig, MonitorEvent, SnapshotSource,
    Subscription, TransportError,
};

type Reply = Result<Vec<InstanceSnapshot>, TransportError>;

/// Source that replays scripted replies in order and repeats the last one.
#[derive(Default)]
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Makes every later fetch take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for ScriptedSource {
    fn list_instances(&self, _ctx: &FetchContext) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Config with a poll interval long enough that only explicit refreshes run.
pub fn manual_config() -> MonitorConfig {
    MonitorConfig {
        poll_interval_secs: 3600,
        ..MonitorConfig::default()
    }
}

pub fn monitor(source: &Arc<ScriptedSource>, config: MonitorConfig) -> InstanceMonitor {
    InstanceMonitor::new(source.clone(), config).unwrap()
}

/// Receives exactly `n` events, failing if any is missing after a second.
pub fn recv_n(sub: &Subscription, n: usize) -> Vec<MonitorEvent> {
    (0..n)
        .map(|i| {
            sub.recv_timeout(Duration::from_secs(1))
                .unwrap_or_else(|e| panic!("event {i} of {n} missing: {e}"))
        })
        .collect()
}

/// Asserts nothing else arrives within a short window.
pub fn assert_quiet(sub: &Subscription) {
    if let Ok(event) = sub.recv_timeout(Duration::from_millis(150)) {
        panic!("unexpected event: {event:?}");
    }
}

/// Polls `cond` until it holds or two seconds pass.
pub fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
