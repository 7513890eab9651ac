//! When to regenerate the rule set.

/// Minimum age of the last successful apply before an automatic update runs.
pub const UPDATE_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// What asked for an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateTrigger {
    /// Browser / process startup
    Startup,
    /// Extension installed or updated
    Installed,
    /// Periodic check while running
    Elapsed,
    /// Explicit request; ignores the interval
    Manual,
}

impl UpdateTrigger {
    pub fn is_forced(self) -> bool {
        matches!(self, Self::Manual)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Installed => "installed",
            Self::Elapsed => "elapsed",
            Self::Manual => "manual",
        }
    }
}

/// True when no update was recorded or the last one is strictly older than
/// `interval_ms`. A timestamp in the future counts as fresh.
pub fn should_update(last_update_ms: Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
    match last_update_ms {
        None => true,
        Some(last) => now_ms.saturating_sub(last) > interval_ms,
    }
}

/// Hours elapsed since `last_update_ms`, for logging.
pub fn hours_since(last_update_ms: Option<u64>, now_ms: u64) -> Option<f64> {
    last_update_ms.map(|last| now_ms.saturating_sub(last) as f64 / 3.6e6)
}
