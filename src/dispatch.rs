//! Action dispatcher: remediation calls against the gateway.
//!
//! Each action maps to as few remote calls as possible; a bulk action is one
//! call carrying every id. The dispatcher does not refresh anything itself,
//! the panel does a full refresh after a successful action.

use std::sync::Arc;

use opentelemetry::KeyValue;
use serde_json::json;
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::{CONTENT_EXTRACTOR_FUNCTION, FunctionResponse, Gateway, RESET_STUCK_FUNCTION};
use crate::model::ParentRef;
use crate::telemetry::metrics;
use crate::telemetry::queue::{record_affected, start_action_span};

/// A remediation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Delete one queued job and put its parent back to draft.
    Cancel(Uuid),
    /// Same as `Cancel`, offered for jobs classified stuck.
    ClearStuck(Uuid),
    /// Delete many queued jobs in one call.
    BulkCancel(Vec<Uuid>),
    /// Enqueue pending articles for generation in one call.
    Approve(Vec<ParentRef>),
    /// Ask the backend to reset everything stuck in processing.
    ResetStuck,
    /// Re-run content extraction for one article.
    Extract(ParentRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Cancel,
    ClearStuck,
    BulkCancel,
    Approve,
    ResetStuck,
    Extract,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Cancel => "cancel",
            ActionKind::ClearStuck => "clear_stuck",
            ActionKind::BulkCancel => "bulk_cancel",
            ActionKind::Approve => "approve",
            ActionKind::ResetStuck => "reset_stuck",
            ActionKind::Extract => "extract",
        }
    }

    /// Human-readable name used in notices.
    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Cancel => "Cancel job",
            ActionKind::ClearStuck => "Clear stuck job",
            ActionKind::BulkCancel => "Bulk cancel",
            ActionKind::Approve => "Approve articles",
            ActionKind::ResetStuck => "Reset stuck processing",
            ActionKind::Extract => "Extract content",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Cancel(_) => ActionKind::Cancel,
            Action::ClearStuck(_) => ActionKind::ClearStuck,
            Action::BulkCancel(_) => ActionKind::BulkCancel,
            Action::Approve(_) => ActionKind::Approve,
            Action::ResetStuck => ActionKind::ResetStuck,
            Action::Extract(_) => ActionKind::Extract,
        }
    }

    fn target_count(&self) -> usize {
        match self {
            Action::BulkCancel(ids) => ids.len(),
            Action::Approve(parents) => parents.len(),
            Action::ResetStuck => 0,
            Action::Cancel(_) | Action::ClearStuck(_) | Action::Extract(_) => 1,
        }
    }
}

/// What a successful action did.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub kind: ActionKind,
    /// Rows deleted or created. Zero for function-backed actions.
    pub affected: usize,
    /// Function response, for function-backed actions. Not interpreted.
    pub response: Option<FunctionResponse>,
}

impl ActionOutcome {
    fn rows(kind: ActionKind, affected: usize) -> Self {
        Self {
            kind,
            affected,
            response: None,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    gateway: Arc<dyn Gateway>,
    /// `max_attempts` given to newly approved jobs.
    max_attempts: u32,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn Gateway>, max_attempts: u32) -> Self {
        Self {
            gateway,
            max_attempts,
        }
    }

    /// Run one action against the gateway.
    pub async fn dispatch(&self, action: Action) -> Result<ActionOutcome> {
        let kind = action.kind();
        let span = start_action_span(kind.as_str(), action.target_count());

        let result = self.run(action).instrument(span.clone()).await;

        let label = match &result {
            Ok(outcome) => {
                record_affected(&span, outcome.affected);
                span.in_scope(|| info!(affected = outcome.affected, "action completed"));
                "ok"
            }
            Err(e) => {
                span.in_scope(|| warn!("action failed: {e}"));
                "error"
            }
        };
        metrics::actions().add(
            1,
            &[
                KeyValue::new("action", kind.as_str()),
                KeyValue::new("result", label),
            ],
        );
        result
    }

    async fn run(&self, action: Action) -> Result<ActionOutcome> {
        let kind = action.kind();
        match action {
            Action::Cancel(id) | Action::ClearStuck(id) => self.cancel_one(kind, id).await,
            Action::BulkCancel(ids) => {
                if ids.is_empty() {
                    return Err(Error::EmptySelection("bulk cancel"));
                }
                let deleted = self.gateway.delete_queue_items(&ids).await?;
                Ok(ActionOutcome::rows(kind, deleted.len()))
            }
            Action::Approve(parents) => {
                if parents.is_empty() {
                    return Err(Error::EmptySelection("approve"));
                }
                let created = self.gateway.enqueue(&parents, self.max_attempts).await?;
                Ok(ActionOutcome::rows(kind, created.len()))
            }
            Action::ResetStuck => {
                let response = self
                    .gateway
                    .invoke(RESET_STUCK_FUNCTION, json!({ "resetAll": true }))
                    .await?
                    .into_result(RESET_STUCK_FUNCTION)?;
                Ok(ActionOutcome {
                    kind,
                    affected: 0,
                    response: Some(response),
                })
            }
            Action::Extract(parent) => {
                let body = json!({ "articleId": parent.id(), "table": parent.table() });
                let response = self
                    .gateway
                    .invoke(CONTENT_EXTRACTOR_FUNCTION, body)
                    .await?
                    .into_result(CONTENT_EXTRACTOR_FUNCTION)?;
                Ok(ActionOutcome {
                    kind,
                    affected: 0,
                    response: Some(response),
                })
            }
        }
    }

    /// Delete one job, then put its parent back to draft. The revert is
    /// best-effort: a failure is logged and the cancel still succeeds.
    async fn cancel_one(&self, kind: ActionKind, id: Uuid) -> Result<ActionOutcome> {
        let deleted = self.gateway.delete_queue_items(&[id]).await?;
        if deleted.is_empty() {
            info!(%id, "job already gone");
        }
        for parent in deleted.iter().filter_map(|item| item.parent) {
            if let Err(e) = self.gateway.revert_parent(parent).await {
                warn!(%id, %parent, "parent revert failed: {e}");
            }
        }
        Ok(ActionOutcome::rows(kind, deleted.len()))
    }
}
