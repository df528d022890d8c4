//! Pipeline tuning loaded from TOML.
//!
//! ```toml
//! [queue]
//! stale_after_secs = 600
//! default_max_attempts = 3
//!
//! [poll]
//! queue_interval_secs = 30
//! activity_interval_secs = 15
//!
//! [pending]
//! candidate_statuses = ["new", "approved"]
//! limit = 100
//! ```
//!
//! Every key is optional.

use crate::classify::QueuePolicy;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub queue: QueuePolicy,
    pub poll: PollSettings,
    pub pending: PendingSettings,
    pub activity: ActivitySettings,
}

impl PipelineSettings {
    /// Parse settings from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("bad pipeline config: {e}")))
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read pipeline config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }
}

/// Intervals for the two polling loops of a panel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub queue_interval_secs: u64,
    pub activity_interval_secs: u64,
}

impl PollSettings {
    pub fn queue_interval(&self) -> Duration {
        Duration::from_secs(self.queue_interval_secs.max(1))
    }

    pub fn activity_interval(&self) -> Duration {
        Duration::from_secs(self.activity_interval_secs.max(1))
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            queue_interval_secs: 30,
            activity_interval_secs: 15,
        }
    }
}

/// Candidate pool for the pending-articles view.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PendingSettings {
    /// Article processing statuses eligible for approval.
    pub candidate_statuses: Vec<String>,
    pub limit: i64,
}

impl Default for PendingSettings {
    fn default() -> Self {
        Self {
            candidate_statuses: vec!["new".to_string(), "approved".to_string()],
            limit: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivitySettings {
    pub limit: i64,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self { limit: 50 }
    }
}
