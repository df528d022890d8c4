//! Reconciliation: join queue state with parent articles into view models.
//!
//! Two views come out of here. The queue view is every active job joined
//! with its article and classified; terminal failures are hidden. The
//! pending view is the complement: candidate articles that have neither a
//! queued job nor a story yet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tracing::{Instrument, Span, debug};

use crate::classify::{QueuePolicy, classify, is_terminal_failure};
use crate::config::pipeline::PendingSettings;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::model::{Article, ParentRef, QueueRow, WorkItem};
use crate::telemetry::metrics;
use crate::telemetry::queue::{record_ticket, start_fetch_span};

/// Loads and reconciles queue and article state through a [`Gateway`].
#[derive(Clone)]
pub struct Reconciler {
    gateway: Arc<dyn Gateway>,
    policy: QueuePolicy,
    pending: PendingSettings,
}

impl Reconciler {
    pub fn new(gateway: Arc<dyn Gateway>, policy: QueuePolicy, pending: PendingSettings) -> Self {
        Self {
            gateway,
            policy,
            pending,
        }
    }

    pub fn policy(&self) -> &QueuePolicy {
        &self.policy
    }

    /// Active queue, classified against the current wall clock.
    pub async fn load_queued_items(&self) -> Result<Vec<QueueRow>> {
        self.load_queued_items_at(Utc::now()).await
    }

    /// Active queue, classified at `now`.
    pub async fn load_queued_items_at(&self, now: DateTime<Utc>) -> Result<Vec<QueueRow>> {
        self.queued_items(now, start_fetch_span("queue")).await
    }

    /// Like [`Self::load_queued_items_at`], with the fetch span tagged by
    /// the caller's sequence ticket.
    pub async fn load_queued_items_ticketed(
        &self,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Result<Vec<QueueRow>> {
        let span = start_fetch_span("queue");
        record_ticket(&span, seq);
        self.queued_items(now, span).await
    }

    /// Candidate articles with no queued job and no story.
    pub async fn load_pending_articles(&self) -> Result<Vec<Article>> {
        self.pending_articles(start_fetch_span("pending")).await
    }

    /// Like [`Self::load_pending_articles`], with the fetch span tagged by
    /// the caller's sequence ticket.
    pub async fn load_pending_articles_ticketed(&self, seq: u64) -> Result<Vec<Article>> {
        let span = start_fetch_span("pending");
        record_ticket(&span, seq);
        self.pending_articles(span).await
    }

    async fn queued_items(&self, now: DateTime<Utc>, span: Span) -> Result<Vec<QueueRow>> {
        let started = Instant::now();
        let rows = async {
            let items = self.gateway.active_queue().await?;
            let parents = distinct_parents(&items);
            let articles = if parents.is_empty() {
                Vec::new()
            } else {
                self.gateway.articles(&parents).await?
            };
            Ok::<_, crate::error::Error>(join_queue(items, articles, now, &self.policy))
        }
        .instrument(span)
        .await?;

        record_fetch("queue", started);
        for row in &rows {
            metrics::queue_classified().add(
                1,
                &[KeyValue::new("class", row.classification.class.to_string())],
            );
        }
        debug!(rows = rows.len(), "queue reconciled");
        Ok(rows)
    }

    async fn pending_articles(&self, span: Span) -> Result<Vec<Article>> {
        let started = Instant::now();
        let pending = async {
            let candidates = self
                .gateway
                .candidate_articles(&self.pending.candidate_statuses, self.pending.limit)
                .await?;
            let storied = self.gateway.storied_parents().await?;
            let queued = self.gateway.queued_parents().await?;
            Ok::<_, crate::error::Error>(pending_complement(candidates, &storied, &queued))
        }
        .instrument(span)
        .await?;

        record_fetch("pending", started);
        debug!(articles = pending.len(), "pending articles reconciled");
        Ok(pending)
    }
}

fn record_fetch(view: &'static str, started: Instant) {
    metrics::fetch_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("view", view)],
    );
}

/// Distinct parents in first-seen order.
fn distinct_parents(items: &[WorkItem]) -> Vec<ParentRef> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|i| i.parent)
        .filter(|p| seen.insert(*p))
        .collect()
}

/// Left-join items with articles, classify, and drop terminal failures.
/// Item order is preserved.
pub fn join_queue(
    items: Vec<WorkItem>,
    articles: Vec<Article>,
    now: DateTime<Utc>,
    policy: &QueuePolicy,
) -> Vec<QueueRow> {
    let by_parent: HashMap<ParentRef, Article> =
        articles.into_iter().map(|a| (a.parent, a)).collect();

    items
        .into_iter()
        .filter(|item| !is_terminal_failure(item, policy))
        .map(|item| {
            let classification = classify(&item, now, policy);
            QueueRow {
                article: by_parent.get(&item.parent).cloned(),
                item,
                classification,
            }
        })
        .collect()
}

/// `candidates − (storied ∪ queued)`, keeping candidate order.
pub fn pending_complement(
    candidates: Vec<Article>,
    storied: &[ParentRef],
    queued: &[ParentRef],
) -> Vec<Article> {
    let taken: HashSet<ParentRef> = storied.iter().chain(queued).copied().collect();
    candidates
        .into_iter()
        .filter(|a| !taken.contains(&a.parent))
        .collect()
}
