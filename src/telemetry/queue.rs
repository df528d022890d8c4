//! Span helpers for view fetches and remediation actions.

use tracing::Span;

/// Start a span for one view fetch (`queue`, `pending`, `activity`).
///
/// `fetch.seq` is declared empty and can be filled via [`record_ticket`].
pub fn start_fetch_span(view: &str) -> Span {
    tracing::info_span!(
        "desk.fetch",
        "fetch.view" = view,
        "fetch.seq" = tracing::field::Empty,
    )
}

/// Record the sequence ticket a fetch was issued with.
pub fn record_ticket(span: &Span, seq: u64) {
    span.record("fetch.seq", seq);
}

/// Start a span for a dispatched action.
///
/// `action.affected` is declared empty and can be filled via
/// [`record_affected`].
pub fn start_action_span(action: &str, targets: usize) -> Span {
    tracing::info_span!(
        "desk.action",
        "action.kind" = action,
        "action.targets" = targets,
        "action.affected" = tracing::field::Empty,
    )
}

/// Record how many rows an action touched.
pub fn record_affected(span: &Span, affected: usize) {
    span.record("action.affected", affected);
}
