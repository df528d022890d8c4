//! Parent article rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParentRef;

/// An article from `articles` or `topic_articles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub parent: ParentRef,
    pub title: String,
    pub url: Option<String>,
    pub processing_status: String,
    pub created_at: DateTime<Utc>,
}
