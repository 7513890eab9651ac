use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use gt_core::schedule::{hours_since, should_update, UpdateTrigger};
use gt_core::storage::{get_as, KeyValueStore};
use gt_core::types::LAST_UPDATE_KEY;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Decides whether a trigger should start the pipeline and keeps at most one
/// run in flight.
pub struct Scheduler {
    store: Arc<dyn KeyValueStore>,
    interval_ms: u64,
    in_flight: AtomicBool,
}

/// Held for the duration of one pipeline run.
pub struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

/// Answer to a trigger.
pub enum Admission<'a> {
    /// Rules are fresh enough
    Skipped,
    /// Another run holds the slot
    Busy,
    Granted(RunGuard<'a>),
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(store: Arc<dyn KeyValueStore>, interval_ms: u64) -> Self {
        Self {
            store,
            interval_ms,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Last successful apply; unreadable storage counts as never.
    pub fn last_update(&self) -> Option<u64> {
        match get_as::<u64>(self.store.as_ref(), LAST_UPDATE_KEY) {
            Ok(last) => last,
            Err(e) => {
                log::warn!("Could not read last update time: {}", e);
                None
            }
        }
    }

    pub fn is_due(&self, trigger: UpdateTrigger, now: u64) -> bool {
        if trigger.is_forced() {
            return true;
        }

        let last = self.last_update();
        if should_update(last, now, self.interval_ms) {
            return true;
        }

        if let Some(hours) = hours_since(last, now) {
            log::info!("Rules updated {:.1} h ago, skipping {} check", hours, trigger.as_str());
        }
        false
    }

    /// Claim the in-flight slot, or `None` if a run is already going.
    pub fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                flag: &self.in_flight,
            })
    }

    /// Check `trigger` and claim the in-flight slot. Freshness is read again
    /// once the slot is held, so a run that finished in between is not
    /// repeated.
    pub fn admit(&self, trigger: UpdateTrigger, now: u64) -> Admission<'_> {
        if !self.is_due(trigger, now) {
            return Admission::Skipped;
        }

        let guard = match self.try_begin() {
            Some(guard) => guard,
            None => {
                log::info!("Update already in progress, ignoring {} trigger", trigger.as_str());
                return Admission::Busy;
            }
        };

        if !self.is_due(trigger, now) {
            log::info!("Rules were updated by another run, skipping {} trigger", trigger.as_str());
            return Admission::Skipped;
        }
        Admission::Granted(guard)
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Persist `now` as the last successful apply.
    pub fn record_success(&self, now: u64) {
        if let Err(e) = self.store.set(LAST_UPDATE_KEY, Value::from(now)) {
            log::warn!("Could not persist update time: {}", e);
        }
    }
}
