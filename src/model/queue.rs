//! Queue rows from `content_generation_queue` and their joined view model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Article, ParentRef};
use crate::classify::{Classification, QueueClass};
use crate::error::Error;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A queued content-generation job. Read-only copy of a backend row; it may
/// already be stale by the time it is looked at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,

    /// Article this job generates a story for.
    pub parent: ParentRef,

    pub status: QueueStatus,

    /// Number of generation attempts the worker has made.
    pub attempts: u32,

    /// Attempts allowed before the job is considered exhausted.
    /// None = use the policy default.
    pub max_attempts: Option<u32>,

    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// What a delete hands back: enough to revert the parent. The status is
/// not read, so a row the desk cannot classify is still counted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletedItem {
    pub id: Uuid,
    /// None when the row carried neither parent column.
    pub parent: Option<ParentRef>,
}

impl From<WorkItem> for DeletedItem {
    fn from(item: WorkItem) -> Self {
        Self {
            id: item.id,
            parent: Some(item.parent),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status as stored by the backend. Transitions happen in the
/// external worker; this crate only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    /// Statuses that make up the active queue.
    pub const ACTIVE: [QueueStatus; 2] = [QueueStatus::Pending, QueueStatus::Processing];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(Error::InvalidRow {
                table: "content_generation_queue",
                reason: format!("unknown status {other:?}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Queue Row (view model)
// ---------------------------------------------------------------------------

/// A work item joined with its parent article and classified.
#[derive(Debug, Clone, Serialize)]
pub struct QueueRow {
    pub item: WorkItem,
    /// None when the parent row was not found (left join).
    pub article: Option<Article>,
    pub classification: Classification,
}

impl QueueRow {
    pub fn id(&self) -> Uuid {
        self.item.id
    }

    pub fn is_stuck(&self) -> bool {
        self.classification.class == QueueClass::Stuck
    }

    /// Title for display, falling back to the parent reference.
    pub fn title(&self) -> String {
        self.article
            .as_ref()
            .map(|a| a.title.clone())
            .unwrap_or_else(|| self.item.parent.to_string())
    }
}
