//! Last-observed instance state.
//!
//! Owned by exactly one monitor and mutated only by the diff engine while
//! the monitor holds its state lock. Every key refers to an instance present
//! in the most recent successful snapshot.

use std::collections::HashMap;

use crate::snapshot::{IdleDetection, InstanceState};

/// Idle descriptor as stored between cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct IdleRecord {
    /// Descriptor reported by the source.
    pub detection: IdleDetection,
    /// Countdown computed when the descriptor was observed.
    pub minutes_left: Option<i64>,
}

impl IdleRecord {
    /// True if this record was already inside the warning window.
    pub(crate) fn within(&self, threshold_minutes: i64) -> bool {
        self.detection.action_pending && self.minutes_left.is_some_and(|m| m <= threshold_minutes)
    }
}

/// In-memory state store keyed by instance id.
#[derive(Debug, Default, Clone)]
pub struct MonitorState {
    pub(crate) states: HashMap<String, InstanceState>,
    pub(crate) idle: HashMap<String, IdleRecord>,
}

impl MonitorState {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-seen lifecycle state.
    #[must_use]
    pub fn state_of(&self, id: &str) -> Option<InstanceState> {
        self.states.get(id).copied()
    }

    /// Last-seen idle record; `None` when idle detection is off or the instance is unknown.
    #[must_use]
    pub fn idle_of(&self, id: &str) -> Option<&IdleRecord> {
        self.idle.get(id)
    }

    /// Number of tracked instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Tracked ids, sorted.
    #[must_use]
    pub fn instance_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Tracked `(id, state)` pairs, sorted by id.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, InstanceState)> {
        let mut out: Vec<(String, InstanceState)> =
            self.states.iter().map(|(id, state)| (id.clone(), *state)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub(crate) fn forget(&mut self, id: &str) -> Option<InstanceState> {
        self.idle.remove(id);
        self.states.remove(id)
    }
}
