//! Diff engine: turns a raw snapshot into events.
//!
//! Runs once per poll cycle against the monitor's [`MonitorState`], updating
//! it in place. Output order within a cycle is fixed: state changes, idle
//! warnings, removals, then at most one cost alert. Within each group events
//! follow snapshot order (removals are sorted by id).

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::config::MonitorConfig;
use crate::snapshot::InstanceSnapshot;

use super::events::MonitorEvent;
use super::state::{IdleRecord, MonitorState};

/// Thresholds consulted by [`diff_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffSettings {
    /// Warn when a pending idle action is at most this many minutes away.
    pub idle_notify_minutes: i64,
    /// Alert when the summed daily cost is strictly above this value.
    pub cost_alert_threshold: f64,
    /// Emit `InstanceRemoved` for instances missing from the snapshot.
    pub emit_removal_events: bool,
}

impl Default for DiffSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for DiffSettings {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            idle_notify_minutes: cfg.idle_notify_minutes,
            cost_alert_threshold: cfg.cost_alert_threshold,
            emit_removal_events: cfg.emit_removal_events,
        }
    }
}

/// Compares `snapshot` to `state`, updates `state` and returns the events.
///
/// An idle warning fires when the countdown is inside the lead time and the
/// stored record was not already inside it. A countdown that moves back out
/// of the window re-arms the warning.
pub fn diff_snapshot(
    state: &mut MonitorState,
    snapshot: &[InstanceSnapshot],
    settings: &DiffSettings,
    now: DateTime<Utc>,
) -> Vec<MonitorEvent> {
    let mut changes = Vec::new();
    let mut warnings = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(snapshot.len());
    let mut total_cost = 0.0;

    for inst in snapshot {
        seen.insert(inst.id.as_str());
        total_cost += inst.billable_cost();

        if let Some(old) = state.states.insert(inst.id.clone(), inst.state) {
            if old != inst.state {
                changes.push(MonitorEvent::state_change(inst.id.clone(), old, inst.state, now));
            }
        }

        match inst.idle.as_ref().filter(|idle| idle.enabled) {
            Some(idle) => {
                let minutes_left = if idle.action_pending {
                    idle.minutes_remaining(now)
                } else {
                    None
                };

                if let Some(left) = minutes_left {
                    let already_warned = state
                        .idle
                        .get(&inst.id)
                        .is_some_and(|prev| prev.within(settings.idle_notify_minutes));
                    if left <= settings.idle_notify_minutes && !already_warned {
                        warnings.push(MonitorEvent::idle_warning(
                            inst.id.clone(),
                            idle.policy.clone(),
                            idle.idle_minutes,
                            idle.threshold_minutes,
                            left.max(0),
                            now,
                        ));
                    }
                }

                state.idle.insert(
                    inst.id.clone(),
                    IdleRecord {
                        detection: idle.clone(),
                        minutes_left,
                    },
                );
            }
            None => {
                state.idle.remove(&inst.id);
            }
        }
    }

    let mut gone: Vec<String> = state
        .states
        .keys()
        .filter(|id| !seen.contains(id.as_str()))
        .cloned()
        .collect();
    gone.sort();

    let mut removals = Vec::new();
    for id in gone {
        if let Some(last) = state.forget(&id) {
            if settings.emit_removal_events {
                removals.push(MonitorEvent::instance_removed(id, last, now));
            }
        }
    }
    // Idle records can only exist for tracked instances.
    state.idle.retain(|id, _| seen.contains(id.as_str()));

    let mut events = changes;
    events.append(&mut warnings);
    events.append(&mut removals);

    if total_cost > settings.cost_alert_threshold {
        events.push(MonitorEvent::cost_alert(
            total_cost,
            settings.cost_alert_threshold,
            seen.len(),
            now,
        ));
    }

    events
}
