//! Queue classifier: labels a work item pending, processing or stuck.
//!
//! Pure. The caller supplies `now` so results are deterministic.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{QueueStatus, WorkItem};

/// Thresholds that decide when a job counts as stuck.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueuePolicy {
    /// A processing job older than this is stuck.
    pub stale_after_secs: u64,
    /// Used when a row carries no `max_attempts`.
    pub default_max_attempts: u32,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            stale_after_secs: 600,
            default_max_attempts: 3,
        }
    }
}

impl QueuePolicy {
    pub fn stale_after(&self) -> TimeDelta {
        i64::try_from(self.stale_after_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    pub fn max_attempts_for(&self, item: &WorkItem) -> u32 {
        item.max_attempts.unwrap_or(self.default_max_attempts)
    }

    pub fn attempts_exhausted(&self, item: &WorkItem) -> bool {
        item.attempts >= self.max_attempts_for(item)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueClass {
    Pending,
    Processing,
    Stuck,
}

impl std::fmt::Display for QueueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueueClass::Pending => "pending",
            QueueClass::Processing => "processing",
            QueueClass::Stuck => "stuck",
        };
        f.pad(s)
    }
}

/// Why a job was judged stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StuckReason {
    AttemptsExhausted { attempts: u32, max_attempts: u32 },
    Stale { age_secs: i64 },
}

impl std::fmt::Display for StuckReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StuckReason::AttemptsExhausted {
                attempts,
                max_attempts,
            } => write!(f, "attempts exhausted ({attempts}/{max_attempts})"),
            StuckReason::Stale { age_secs } => {
                write!(f, "processing for {}m{}s", age_secs / 60, age_secs % 60)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub class: QueueClass,
    pub reason: Option<StuckReason>,
}

/// Classify a single work item at `now`.
pub fn classify(item: &WorkItem, now: DateTime<Utc>, policy: &QueuePolicy) -> Classification {
    let max_attempts = policy.max_attempts_for(item);
    if item.attempts >= max_attempts {
        return Classification {
            class: QueueClass::Stuck,
            reason: Some(StuckReason::AttemptsExhausted {
                attempts: item.attempts,
                max_attempts,
            }),
        };
    }

    if item.status == QueueStatus::Processing {
        let stale = now
            .checked_sub_signed(policy.stale_after())
            .is_some_and(|cutoff| item.created_at < cutoff);
        if stale {
            return Classification {
                class: QueueClass::Stuck,
                reason: Some(StuckReason::Stale {
                    age_secs: (now - item.created_at).num_seconds(),
                }),
            };
        }
        return Classification {
            class: QueueClass::Processing,
            reason: None,
        };
    }

    Classification {
        class: QueueClass::Pending,
        reason: None,
    }
}

/// Exhausted and no longer being worked on. Such rows are hidden from the
/// active queue view.
pub fn is_terminal_failure(item: &WorkItem, policy: &QueuePolicy) -> bool {
    policy.attempts_exhausted(item) && item.status != QueueStatus::Processing
}
