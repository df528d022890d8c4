//! Remote data gateway: the hosted backend seen through two call shapes.
//!
//! Table-style queries go to Postgres ([`crate::db::Db`]); named functions go
//! over HTTPS ([`functions::FunctionsClient`]). Everything above this module
//! talks to the [`Gateway`] trait so tests can swap in
//! [`memory::MemoryGateway`].

pub mod functions;
pub mod memory;

use async_trait::async_trait;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::{ActivityEntry, Article, DeletedItem, ParentRef, WorkItem};
use crate::telemetry::metrics;
use functions::FunctionsClient;

/// Function that clears jobs stuck in processing.
pub const RESET_STUCK_FUNCTION: &str = "reset-stuck-processing";
/// Function that (re)extracts article body content.
pub const CONTENT_EXTRACTOR_FUNCTION: &str = "content-extractor";

/// Everything the desk needs from the backend.
///
/// Implemented by [`RemoteGateway`] (production) and
/// [`memory::MemoryGateway`] (tests, no backend required).
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Queue rows with status pending or processing, oldest first.
    async fn active_queue(&self) -> Result<Vec<WorkItem>>;

    /// Parent of every queue row regardless of status.
    async fn queued_parents(&self) -> Result<Vec<ParentRef>>;

    /// Parent rows for the given references; missing rows are omitted.
    async fn articles(&self, parents: &[ParentRef]) -> Result<Vec<Article>>;

    /// Newest articles whose processing status is in `statuses`.
    async fn candidate_articles(&self, statuses: &[String], limit: i64) -> Result<Vec<Article>>;

    /// Parents that already have a story.
    async fn storied_parents(&self) -> Result<Vec<ParentRef>>;

    /// Newest backend activity log lines.
    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>>;

    /// Delete queue rows in one call. Returns what was actually deleted.
    async fn delete_queue_items(&self, ids: &[Uuid]) -> Result<Vec<DeletedItem>>;

    /// Reset a parent's story to draft and the article to new.
    async fn revert_parent(&self, parent: ParentRef) -> Result<()>;

    /// Insert one pending job per parent in one call.
    async fn enqueue(&self, parents: &[ParentRef], max_attempts: u32) -> Result<Vec<WorkItem>>;

    /// Invoke a named remote function with a JSON body.
    async fn invoke(&self, function: &str, body: serde_json::Value) -> Result<FunctionResponse>;
}

/// Response envelope shared by all remote functions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Any other fields. Opaque to the desk.
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl FunctionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: serde_json::Map::new(),
        }
    }

    /// Turn `success: false` into [`Error::Function`].
    pub fn into_result(self, function: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::Function {
                name: function.to_string(),
                message: self
                    .error
                    .unwrap_or_else(|| "function reported failure".to_string()),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteGateway (Postgres + functions)
// ---------------------------------------------------------------------------

/// Production gateway: Postgres for tables, HTTPS for functions.
pub struct RemoteGateway {
    db: Db,
    functions: FunctionsClient,
}

impl RemoteGateway {
    pub fn new(db: Db, functions: FunctionsClient) -> Self {
        Self { db, functions }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

fn count_call(operation: &'static str) {
    metrics::gateway_calls().add(1, &[KeyValue::new("operation", operation)]);
}

#[async_trait]
impl Gateway for RemoteGateway {
    async fn active_queue(&self) -> Result<Vec<WorkItem>> {
        count_call("active_queue");
        self.db.active_queue().await
    }

    async fn queued_parents(&self) -> Result<Vec<ParentRef>> {
        count_call("queued_parents");
        self.db.queued_parents().await
    }

    async fn articles(&self, parents: &[ParentRef]) -> Result<Vec<Article>> {
        count_call("articles");
        self.db.articles(parents).await
    }

    async fn candidate_articles(&self, statuses: &[String], limit: i64) -> Result<Vec<Article>> {
        count_call("candidate_articles");
        self.db.candidate_articles(statuses, limit).await
    }

    async fn storied_parents(&self) -> Result<Vec<ParentRef>> {
        count_call("storied_parents");
        self.db.storied_parents().await
    }

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>> {
        count_call("recent_activity");
        self.db.recent_activity(limit).await
    }

    async fn delete_queue_items(&self, ids: &[Uuid]) -> Result<Vec<DeletedItem>> {
        count_call("delete_queue_items");
        self.db.delete_queue_items(ids).await
    }

    async fn revert_parent(&self, parent: ParentRef) -> Result<()> {
        count_call("revert_parent");
        self.db.revert_parent(parent).await
    }

    async fn enqueue(&self, parents: &[ParentRef], max_attempts: u32) -> Result<Vec<WorkItem>> {
        count_call("enqueue");
        self.db.enqueue(parents, max_attempts).await
    }

    async fn invoke(&self, function: &str, body: serde_json::Value) -> Result<FunctionResponse> {
        count_call("invoke");
        self.functions.invoke(function, &body).await
    }
}
