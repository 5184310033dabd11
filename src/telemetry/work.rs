//! Work item span helpers.
//!
//! Provides span creation and status-transition recording for work items
//! flowing through [`crate::Client::process`].

use crate::model::{WorkItemId, WorkqueueId};
use tracing::Span;

/// Start a span for processing one claimed work item.
///
/// The `workitem.status` field is declared empty and can be updated via
/// [`record_status_transition`].
pub fn start_item_span(workqueue_id: WorkqueueId, work_item_id: WorkItemId) -> Span {
    tracing::info_span!(
        "workitem.process",
        "workqueue.id" = workqueue_id.0,
        "workitem.id" = work_item_id.0,
        "workitem.status" = tracing::field::Empty,
    )
}

/// Record a status transition on the given span.
///
/// Emits a tracing `info` event scoped to the span and, when the span was
/// created by [`start_item_span`], updates its `workitem.status` field.
pub fn record_status_transition(span: &Span, from: &str, to: &str) {
    span.record("workitem.status", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "status_transition");
    });
}
