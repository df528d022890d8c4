//! Core data model.
//!
//! A work item is one queued content-generation job. It points at exactly one
//! parent article, which lives either in the legacy `articles` table or in the
//! multi-tenant `topic_articles` table.

pub mod activity;
pub mod article;
pub mod queue;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use activity::{ActivityEntry, LogLevel};
pub use article::Article;
pub use queue::{DeletedItem, QueueRow, QueueStatus, WorkItem};

// ---------------------------------------------------------------------------
// Parent reference
// ---------------------------------------------------------------------------

/// The article a work item (or story) is generating output for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "table", content = "id", rename_all = "snake_case")]
pub enum ParentRef {
    /// Row in `articles`.
    Legacy(Uuid),
    /// Row in `topic_articles`.
    Topic(Uuid),
}

impl ParentRef {
    /// Build from the nullable column pair carried by queue and story rows.
    /// Legacy wins if both are set.
    pub fn from_columns(article_id: Option<Uuid>, topic_article_id: Option<Uuid>) -> Option<Self> {
        match (article_id, topic_article_id) {
            (Some(id), _) => Some(ParentRef::Legacy(id)),
            (None, Some(id)) => Some(ParentRef::Topic(id)),
            (None, None) => None,
        }
    }

    pub fn id(self) -> Uuid {
        match self {
            ParentRef::Legacy(id) | ParentRef::Topic(id) => id,
        }
    }

    /// Name of the table holding the parent row.
    pub fn table(self) -> &'static str {
        match self {
            ParentRef::Legacy(_) => "articles",
            ParentRef::Topic(_) => "topic_articles",
        }
    }

    /// Split into (`article_id`, `topic_article_id`) column values.
    pub fn columns(self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            ParentRef::Legacy(id) => (Some(id), None),
            ParentRef::Topic(id) => (None, Some(id)),
        }
    }
}

impl std::fmt::Display for ParentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParentRef::Legacy(id) => write!(f, "article:{}", &id.to_string()[..8]),
            ParentRef::Topic(id) => write!(f, "topic:{}", &id.to_string()[..8]),
        }
    }
}
