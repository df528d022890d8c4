//! In-memory gateway for tests. No backend required.
//!
//! Holds the same tables the desk reads, records every call for assertions,
//! and can be told to fail or delay any operation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{FunctionResponse, Gateway};
use crate::error::{Error, Result};
use crate::model::{ActivityEntry, Article, DeletedItem, ParentRef, QueueStatus, WorkItem};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ActiveQueue,
    QueuedParents,
    Articles(Vec<ParentRef>),
    CandidateArticles,
    StoriedParents,
    RecentActivity,
    DeleteQueueItems(Vec<Uuid>),
    RevertParent(ParentRef),
    Enqueue(Vec<ParentRef>),
    Invoke {
        function: String,
        body: serde_json::Value,
    },
}

impl GatewayCall {
    /// Operation name, matching the names accepted by [`MemoryGateway::fail`].
    pub fn operation(&self) -> &'static str {
        match self {
            GatewayCall::ActiveQueue => "active_queue",
            GatewayCall::QueuedParents => "queued_parents",
            GatewayCall::Articles(_) => "articles",
            GatewayCall::CandidateArticles => "candidate_articles",
            GatewayCall::StoriedParents => "storied_parents",
            GatewayCall::RecentActivity => "recent_activity",
            GatewayCall::DeleteQueueItems(_) => "delete_queue_items",
            GatewayCall::RevertParent(_) => "revert_parent",
            GatewayCall::Enqueue(_) => "enqueue",
            GatewayCall::Invoke { .. } => "invoke",
        }
    }
}

#[derive(Default)]
struct Tables {
    queue: Vec<WorkItem>,
    articles: Vec<Article>,
    stories: Vec<(ParentRef, String)>,
    activity: Vec<ActivityEntry>,
}

#[derive(Default)]
pub struct MemoryGateway {
    tables: Mutex<Tables>,
    calls: Mutex<Vec<GatewayCall>>,
    failing: Mutex<HashSet<&'static str>>,
    delays: Mutex<HashMap<&'static str, VecDeque<Duration>>>,
    function_responses: Mutex<HashMap<String, FunctionResponse>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // --- seeding -----------------------------------------------------------

    pub fn insert_work_item(&self, item: WorkItem) {
        lock(&self.tables).queue.push(item);
    }

    pub fn insert_article(&self, article: Article) {
        lock(&self.tables).articles.push(article);
    }

    pub fn insert_story(&self, parent: ParentRef, status: impl Into<String>) {
        lock(&self.tables).stories.push((parent, status.into()));
    }

    pub fn insert_activity(&self, entry: ActivityEntry) {
        lock(&self.tables).activity.push(entry);
    }

    /// Replace a queue row in place (simulates the external worker).
    pub fn update_work_item(&self, item: WorkItem) {
        let mut tables = lock(&self.tables);
        if let Some(row) = tables.queue.iter_mut().find(|r| r.id == item.id) {
            *row = item;
        }
    }

    pub fn clear_queue(&self) {
        lock(&self.tables).queue.clear();
    }

    // --- behavior ----------------------------------------------------------

    /// Make every call to `operation` fail until [`Self::heal`].
    pub fn fail(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    pub fn heal(&self, operation: &'static str) {
        lock(&self.failing).remove(operation);
    }

    /// Delay the next call to `operation` by `delay`. The call does its
    /// reads and writes first and then sleeps, so a delayed read returns
    /// the state as of call time.
    pub fn delay_next(&self, operation: &'static str, delay: Duration) {
        lock(&self.delays).entry(operation).or_default().push_back(delay);
    }

    pub fn set_function_response(&self, function: &str, response: FunctionResponse) {
        lock(&self.function_responses).insert(function.to_string(), response);
    }

    // --- inspection --------------------------------------------------------

    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    /// Recorded calls of one operation.
    pub fn calls_to(&self, operation: &str) -> Vec<GatewayCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn queue_ids(&self) -> Vec<Uuid> {
        lock(&self.tables).queue.iter().map(|i| i.id).collect()
    }

    pub fn story_status(&self, parent: ParentRef) -> Option<String> {
        lock(&self.tables)
            .stories
            .iter()
            .find(|(p, _)| *p == parent)
            .map(|(_, s)| s.clone())
    }

    pub fn article_status(&self, parent: ParentRef) -> Option<String> {
        lock(&self.tables)
            .articles
            .iter()
            .find(|a| a.parent == parent)
            .map(|a| a.processing_status.clone())
    }

    /// Record the call and fail it if the operation is marked failing.
    fn enter(&self, call: GatewayCall) -> Result<()> {
        let operation = call.operation();
        lock(&self.calls).push(call);
        if lock(&self.failing).contains(operation) {
            return Err(Error::Other(format!("injected failure: {operation}")));
        }
        Ok(())
    }

    /// Sleep if a delay is scheduled for `operation`.
    async fn settle(&self, operation: &'static str) {
        let delay = lock(&self.delays)
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn active_queue(&self) -> Result<Vec<WorkItem>> {
        self.enter(GatewayCall::ActiveQueue)?;
        let mut rows: Vec<WorkItem> = lock(&self.tables)
            .queue
            .iter()
            .filter(|i| QueueStatus::ACTIVE.contains(&i.status))
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.created_at);
        self.settle("active_queue").await;
        Ok(rows)
    }

    async fn queued_parents(&self) -> Result<Vec<ParentRef>> {
        self.enter(GatewayCall::QueuedParents)?;
        let parents = lock(&self.tables).queue.iter().map(|i| i.parent).collect();
        self.settle("queued_parents").await;
        Ok(parents)
    }

    async fn articles(&self, parents: &[ParentRef]) -> Result<Vec<Article>> {
        self.enter(GatewayCall::Articles(parents.to_vec()))?;
        let wanted: HashSet<&ParentRef> = parents.iter().collect();
        let rows = lock(&self.tables)
            .articles
            .iter()
            .filter(|a| wanted.contains(&a.parent))
            .cloned()
            .collect();
        self.settle("articles").await;
        Ok(rows)
    }

    async fn candidate_articles(&self, statuses: &[String], limit: i64) -> Result<Vec<Article>> {
        self.enter(GatewayCall::CandidateArticles)?;
        let mut rows: Vec<Article> = lock(&self.tables)
            .articles
            .iter()
            .filter(|a| statuses.contains(&a.processing_status))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        self.settle("candidate_articles").await;
        Ok(rows)
    }

    async fn storied_parents(&self) -> Result<Vec<ParentRef>> {
        self.enter(GatewayCall::StoriedParents)?;
        let parents = lock(&self.tables).stories.iter().map(|(p, _)| *p).collect();
        self.settle("storied_parents").await;
        Ok(parents)
    }

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>> {
        self.enter(GatewayCall::RecentActivity)?;
        let mut rows = lock(&self.tables).activity.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        self.settle("recent_activity").await;
        Ok(rows)
    }

    async fn delete_queue_items(&self, ids: &[Uuid]) -> Result<Vec<DeletedItem>> {
        self.enter(GatewayCall::DeleteQueueItems(ids.to_vec()))?;
        let deleted: Vec<DeletedItem> = {
            let mut tables = lock(&self.tables);
            let (deleted, kept): (Vec<WorkItem>, Vec<WorkItem>) = tables
                .queue
                .drain(..)
                .partition(|item| ids.contains(&item.id));
            tables.queue = kept;
            deleted.into_iter().map(DeletedItem::from).collect()
        };
        self.settle("delete_queue_items").await;
        Ok(deleted)
    }

    async fn revert_parent(&self, parent: ParentRef) -> Result<()> {
        self.enter(GatewayCall::RevertParent(parent))?;
        {
            let mut tables = lock(&self.tables);
            for (p, status) in tables.stories.iter_mut() {
                if *p == parent {
                    *status = "draft".to_string();
                }
            }
            for article in tables.articles.iter_mut() {
                if article.parent == parent {
                    article.processing_status = "new".to_string();
                }
            }
        }
        self.settle("revert_parent").await;
        Ok(())
    }

    async fn enqueue(&self, parents: &[ParentRef], max_attempts: u32) -> Result<Vec<WorkItem>> {
        self.enter(GatewayCall::Enqueue(parents.to_vec()))?;
        let now = Utc::now();
        let created: Vec<WorkItem> = parents
            .iter()
            .map(|parent| WorkItem {
                id: Uuid::new_v4(),
                parent: *parent,
                status: QueueStatus::Pending,
                attempts: 0,
                max_attempts: Some(max_attempts),
                error_message: None,
                created_at: now,
            })
            .collect();
        lock(&self.tables).queue.extend(created.iter().cloned());
        self.settle("enqueue").await;
        Ok(created)
    }

    async fn invoke(&self, function: &str, body: serde_json::Value) -> Result<FunctionResponse> {
        self.enter(GatewayCall::Invoke {
            function: function.to_string(),
            body,
        })?;
        let response = lock(&self.function_responses)
            .get(function)
            .cloned()
            .unwrap_or_else(FunctionResponse::ok);
        self.settle("invoke").await;
        Ok(response)
    }
}
