//! Panel: the view-binding an operator surface sits on.
//!
//! Holds the latest queue, pending and activity snapshots, two selection
//! sets, and the notice backlog. This is the error boundary: fetch and
//! action failures become notices here and never propagate further.
//!
//! Fetches are sequenced per view. Each fetch takes a ticket before calling
//! the gateway and its result is applied only if no newer fetch of the same
//! view has been applied meanwhile, so a slow early response cannot
//! overwrite a fresher one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use crate::classify::QueueClass;
use crate::config::PipelineSettings;
use crate::dispatch::{Action, ActionKind, ActionOutcome, Dispatcher};
use crate::gateway::Gateway;
use crate::model::{ActivityEntry, Article, ParentRef, QueueRow};
use crate::notice::{Notice, Notices};
use crate::reconcile::Reconciler;
use crate::selection::SelectionSet;
use crate::telemetry::metrics;
use crate::telemetry::queue::{record_ticket, start_fetch_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Queue,
    Pending,
    Activity,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Queue => "queue",
            View::Pending => "pending",
            View::Activity => "activity",
        }
    }

    fn title(self) -> &'static str {
        match self {
            View::Queue => "Queue refresh failed",
            View::Pending => "Pending articles refresh failed",
            View::Activity => "Activity refresh failed",
        }
    }
}

/// Monotonic per-view ticket counters.
#[derive(Default)]
struct Tickets {
    queue: AtomicU64,
    pending: AtomicU64,
    activity: AtomicU64,
}

impl Tickets {
    fn issue(&self, view: View) -> u64 {
        let counter = match view {
            View::Queue => &self.queue,
            View::Pending => &self.pending,
            View::Activity => &self.activity,
        };
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Default)]
struct PanelState {
    queue: Vec<QueueRow>,
    pending: Vec<Article>,
    activity: Vec<ActivityEntry>,
    job_selection: SelectionSet<Uuid>,
    article_selection: SelectionSet<ParentRef>,
    notices: Notices,
    applied_queue: u64,
    applied_pending: u64,
    applied_activity: u64,
    refreshed_at: Option<DateTime<Utc>>,
}

impl PanelState {
    /// Claim `seq` as the newest applied ticket for `view`. False if a newer
    /// one already landed.
    fn accept(&mut self, view: View, seq: u64) -> bool {
        let applied = match view {
            View::Queue => &mut self.applied_queue,
            View::Pending => &mut self.applied_pending,
            View::Activity => &mut self.applied_activity,
        };
        if seq <= *applied {
            return false;
        }
        *applied = seq;
        true
    }
}

type InFlightSet = Arc<StdMutex<HashSet<Action>>>;

fn lock_in_flight(set: &StdMutex<HashSet<Action>>) -> MutexGuard<'_, HashSet<Action>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Claim on one running action. Released on drop, so an abandoned `run`
/// (timeout, `select!`, aborted task) does not block that action forever.
struct InFlight {
    set: InFlightSet,
    action: Action,
}

impl InFlight {
    /// None if an identical action is already running.
    fn claim(set: &InFlightSet, action: &Action) -> Option<Self> {
        if !lock_in_flight(set).insert(action.clone()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            action: action.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock_in_flight(&self.set).remove(&self.action);
    }
}

/// Point-in-time copy of everything a panel shows.
#[derive(Debug, Clone)]
pub struct PanelSnapshot {
    pub queue: Vec<QueueRow>,
    pub pending: Vec<Article>,
    pub activity: Vec<ActivityEntry>,
    pub selected_jobs: Vec<Uuid>,
    pub selected_articles: Vec<ParentRef>,
    pub notices: Vec<Notice>,
    /// Kind of every running action, one entry per action.
    pub in_flight: Vec<ActionKind>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl PanelSnapshot {
    pub fn stuck(&self) -> impl Iterator<Item = &QueueRow> {
        self.queue.iter().filter(|r| r.is_stuck())
    }

    pub fn count(&self, class: QueueClass) -> usize {
        self.queue
            .iter()
            .filter(|r| r.classification.class == class)
            .count()
    }
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Panel {
    gateway: Arc<dyn Gateway>,
    reconciler: Reconciler,
    dispatcher: Dispatcher,
    activity_limit: i64,
    tickets: Arc<Tickets>,
    in_flight: InFlightSet,
    state: Arc<Mutex<PanelState>>,
}

impl Panel {
    pub fn new(gateway: Arc<dyn Gateway>, settings: &PipelineSettings) -> Self {
        let reconciler = Reconciler::new(
            Arc::clone(&gateway),
            settings.queue.clone(),
            settings.pending.clone(),
        );
        let dispatcher = Dispatcher::new(Arc::clone(&gateway), settings.queue.default_max_attempts);
        Self {
            gateway,
            reconciler,
            dispatcher,
            activity_limit: settings.activity.limit,
            tickets: Arc::new(Tickets::default()),
            in_flight: InFlightSet::default(),
            state: Arc::new(Mutex::new(PanelState::default())),
        }
    }

    // --- refresh -----------------------------------------------------------

    /// Re-run the queue fetcher. Returns whether the result was applied.
    pub async fn refresh_queue(&self) -> bool {
        self.refresh_queue_at(Utc::now()).await
    }

    /// Re-run the queue fetcher, classifying at `now`.
    pub async fn refresh_queue_at(&self, now: DateTime<Utc>) -> bool {
        let seq = self.tickets.issue(View::Queue);
        let result = self.reconciler.load_queued_items_ticketed(now, seq).await;

        let mut state = self.state.lock().await;
        if !state.accept(View::Queue, seq) {
            debug!(seq, "discarding out-of-date queue snapshot");
            return false;
        }
        match result {
            Ok(rows) => {
                let dropped = state
                    .job_selection
                    .retain_present(rows.iter().map(|r| &r.item.id));
                if dropped > 0 {
                    debug!(dropped, "pruned vanished jobs from selection");
                }
                state.queue = rows;
                state.refreshed_at = Some(now);
            }
            Err(e) => {
                fetch_failed(&mut state, View::Queue, &e);
                state.queue.clear();
                state.job_selection.clear();
            }
        }
        true
    }

    /// Re-run the pending-articles fetcher. Returns whether the result was applied.
    pub async fn refresh_pending(&self) -> bool {
        let seq = self.tickets.issue(View::Pending);
        let result = self.reconciler.load_pending_articles_ticketed(seq).await;

        let mut state = self.state.lock().await;
        if !state.accept(View::Pending, seq) {
            debug!(seq, "discarding out-of-date pending snapshot");
            return false;
        }
        match result {
            Ok(articles) => {
                state
                    .article_selection
                    .retain_present(articles.iter().map(|a| &a.parent));
                state.pending = articles;
            }
            Err(e) => {
                fetch_failed(&mut state, View::Pending, &e);
                state.pending.clear();
                state.article_selection.clear();
            }
        }
        true
    }

    /// Re-read recent activity. On failure the previous entries stay.
    pub async fn refresh_activity(&self) -> bool {
        let seq = self.tickets.issue(View::Activity);
        let span = start_fetch_span(View::Activity.as_str());
        record_ticket(&span, seq);
        let result = self
            .gateway
            .recent_activity(self.activity_limit)
            .instrument(span)
            .await;

        let mut state = self.state.lock().await;
        if !state.accept(View::Activity, seq) {
            debug!(seq, "discarding out-of-date activity snapshot");
            return false;
        }
        match result {
            Ok(entries) => state.activity = entries,
            Err(e) => fetch_failed(&mut state, View::Activity, &e),
        }
        true
    }

    /// Queue and pending views together, the refresh every action triggers.
    pub async fn refresh_views(&self) {
        tokio::join!(self.refresh_queue(), self.refresh_pending());
    }

    /// All three views.
    pub async fn refresh_all(&self) {
        tokio::join!(
            self.refresh_queue(),
            self.refresh_pending(),
            self.refresh_activity()
        );
    }

    // --- selection ---------------------------------------------------------

    pub async fn toggle_job(&self, id: Uuid) -> bool {
        self.state.lock().await.job_selection.toggle(id)
    }

    /// Select every job in the current queue snapshot.
    pub async fn select_all_jobs(&self) {
        let mut state = self.state.lock().await;
        let ids: Vec<Uuid> = state.queue.iter().map(|r| r.id()).collect();
        state.job_selection.select_all(ids);
    }

    /// Select every stuck job in the current queue snapshot.
    pub async fn select_stuck_jobs(&self) {
        let mut state = self.state.lock().await;
        let ids: Vec<Uuid> = state
            .queue
            .iter()
            .filter(|r| r.is_stuck())
            .map(|r| r.id())
            .collect();
        state.job_selection.select_all(ids);
    }

    pub async fn clear_job_selection(&self) {
        self.state.lock().await.job_selection.clear();
    }

    pub async fn toggle_article(&self, parent: ParentRef) -> bool {
        self.state.lock().await.article_selection.toggle(parent)
    }

    /// Select every article in the current pending snapshot.
    pub async fn select_all_articles(&self) {
        let mut state = self.state.lock().await;
        let parents: Vec<ParentRef> = state.pending.iter().map(|a| a.parent).collect();
        state.article_selection.select_all(parents);
    }

    pub async fn clear_article_selection(&self) {
        self.state.lock().await.article_selection.clear();
    }

    // --- actions -----------------------------------------------------------

    pub async fn cancel(&self, id: Uuid) -> Option<ActionOutcome> {
        self.run(Action::Cancel(id)).await
    }

    pub async fn clear_stuck(&self, id: Uuid) -> Option<ActionOutcome> {
        self.run(Action::ClearStuck(id)).await
    }

    /// Cancel every selected job in one call.
    pub async fn bulk_cancel_selected(&self) -> Option<ActionOutcome> {
        let ids = self.state.lock().await.job_selection.ids();
        self.run(Action::BulkCancel(ids)).await
    }

    /// Enqueue every selected pending article in one call.
    pub async fn approve_selected(&self) -> Option<ActionOutcome> {
        let parents = self.state.lock().await.article_selection.ids();
        self.run(Action::Approve(parents)).await
    }

    pub async fn reset_stuck(&self) -> Option<ActionOutcome> {
        self.run(Action::ResetStuck).await
    }

    pub async fn extract(&self, parent: ParentRef) -> Option<ActionOutcome> {
        self.run(Action::Extract(parent)).await
    }

    /// Dispatch an action, turn the result into a notice, and on success
    /// refresh the queue and pending views. Returns None when the action
    /// failed or was refused because the same action on the same target is
    /// already running.
    pub async fn run(&self, action: Action) -> Option<ActionOutcome> {
        let kind = action.kind();
        let Some(claim) = InFlight::claim(&self.in_flight, &action) else {
            self.state
                .lock()
                .await
                .notices
                .info(kind.label(), "already running");
            metrics::actions().add(
                1,
                &[
                    KeyValue::new("action", kind.as_str()),
                    KeyValue::new("result", "refused"),
                ],
            );
            return None;
        };

        let result = self.dispatcher.dispatch(action).await;

        {
            let mut state = self.state.lock().await;
            drop(claim);
            match &result {
                Ok(outcome) => {
                    state.notices.success(kind.label(), describe(outcome));
                    match kind {
                        ActionKind::BulkCancel => state.job_selection.clear(),
                        ActionKind::Approve => state.article_selection.clear(),
                        _ => {}
                    }
                }
                Err(e) => {
                    state.notices.error(kind.label(), e.to_string());
                }
            }
        }

        let outcome = result.ok()?;
        info!(action = %kind, affected = outcome.affected, "refreshing after action");
        self.refresh_views().await;
        Some(outcome)
    }

    // --- reading -----------------------------------------------------------

    pub async fn snapshot(&self) -> PanelSnapshot {
        let mut in_flight: Vec<ActionKind> = lock_in_flight(&self.in_flight)
            .iter()
            .map(Action::kind)
            .collect();
        in_flight.sort_by_key(|k| k.as_str());
        let state = self.state.lock().await;
        PanelSnapshot {
            queue: state.queue.clone(),
            pending: state.pending.clone(),
            activity: state.activity.clone(),
            selected_jobs: state.job_selection.ids(),
            selected_articles: state.article_selection.ids(),
            notices: state.notices.active(),
            in_flight,
            refreshed_at: state.refreshed_at,
        }
    }

    pub async fn dismiss_notice(&self, id: u64) -> bool {
        self.state.lock().await.notices.dismiss(id)
    }

    /// Take all notices, e.g. to print them once.
    pub async fn take_notices(&self) -> Vec<Notice> {
        self.state.lock().await.notices.drain()
    }
}

fn fetch_failed(state: &mut PanelState, view: View, error: &crate::error::Error) {
    warn!(view = view.as_str(), "fetch failed: {error}");
    metrics::fetch_failures().add(1, &[KeyValue::new("view", view.as_str())]);
    state.notices.error(view.title(), error.to_string());
}

fn describe(outcome: &ActionOutcome) -> String {
    match outcome.kind {
        ActionKind::Cancel | ActionKind::ClearStuck | ActionKind::BulkCancel => {
            format!("{} job(s) removed", outcome.affected)
        }
        ActionKind::Approve => format!("{} article(s) queued", outcome.affected),
        ActionKind::ResetStuck => "reset requested".to_string(),
        ActionKind::Extract => "extraction requested".to_string(),
    }
}
