//! Workqueue operations and the claim cursor.

use super::{Client, decode, remote_failure};
use crate::error::Result;
use crate::model::{ClearFilter, WorkItem, WorkItemStatus, Workqueue, WorkqueueId};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct NewItemBody<'a> {
    data: &'a serde_json::Value,
    reference: &'a str,
}

impl Client {
    pub async fn get_workqueue(&self, id: WorkqueueId) -> Result<Workqueue> {
        self.get_json(&format!("/workqueues/{id}")).await
    }

    /// Add an item to a queue. The server assigns its id and sets it `new`.
    pub async fn add_item(
        &self,
        workqueue_id: WorkqueueId,
        data: serde_json::Value,
        reference: &str,
    ) -> Result<WorkItem> {
        let response = self
            .send(
                self.request(Method::POST, &format!("/workqueues/{workqueue_id}/add"))
                    .json(&NewItemBody {
                        data: &data,
                        reference,
                    }),
            )
            .await?;
        let item: WorkItem = decode(response).await?;
        record_queue_operation(workqueue_id, "add");
        debug!(work_item_id = %item.id, %workqueue_id, reference, "work item added");
        Ok(item)
    }

    /// Remove items from a queue, optionally filtered by status and age.
    pub async fn clear_workqueue(
        &self,
        workqueue_id: WorkqueueId,
        filter: &ClearFilter,
    ) -> Result<()> {
        self.send(
            self.request(Method::POST, &format!("/workqueues/{workqueue_id}/clear"))
                .json(filter),
        )
        .await?;
        record_queue_operation(workqueue_id, "clear");
        Ok(())
    }

    /// All items in a queue carrying `reference`, optionally only those in
    /// `status`. Result order is whatever the server returns.
    pub async fn get_items_by_reference(
        &self,
        workqueue_id: WorkqueueId,
        reference: &str,
        status: Option<&WorkItemStatus>,
    ) -> Result<Vec<WorkItem>> {
        let mut request = self.request(
            Method::GET,
            &format!(
                "/workqueues/{workqueue_id}/by_reference/{}",
                urlencoding::encode(reference)
            ),
        );
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        let response = self.send(request).await?;
        decode(response).await
    }

    /// A cursor over the queue's claimable items.
    pub fn items(&self, workqueue_id: WorkqueueId) -> WorkItems<'_> {
        WorkItems {
            client: self,
            workqueue_id,
            finished: false,
        }
    }

    /// One claim round trip. `None` when the server answers 204.
    async fn claim_next_item(&self, workqueue_id: WorkqueueId) -> Result<Option<WorkItem>> {
        let (method, response) = self
            .execute(self.request(
                Method::GET,
                &format!("/workqueues/{workqueue_id}/next_item"),
            ))
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            record_queue_operation(workqueue_id, "claim_empty");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(remote_failure(&method, response).await);
        }

        let item: WorkItem = decode(response).await?;
        record_queue_operation(workqueue_id, "claim");
        Ok(Some(item))
    }
}

/// Pull-based cursor over a workqueue.
///
/// Each [`WorkItems::next`] call is exactly one claim request; nothing is
/// prefetched or buffered. The cursor is single-consumer and not restartable:
/// once the server reports no more items, or a claim fails, every later call
/// returns `Ok(None)` without touching the network. Take a fresh cursor from
/// [`Client::items`] to poll again.
#[derive(Debug)]
pub struct WorkItems<'a> {
    client: &'a Client,
    workqueue_id: WorkqueueId,
    finished: bool,
}

impl WorkItems<'_> {
    pub fn workqueue_id(&self) -> WorkqueueId {
        self.workqueue_id
    }

    /// Claim the next item.
    ///
    /// Clears the active work item tag before the request, so a stale tag
    /// never leaks into the claim or past the end of the queue, and sets it
    /// to the claimed item's id on success.
    ///
    /// # Errors
    ///
    /// Any non-2xx answer other than 204 fails with
    /// [`crate::Error::RemoteRequest`] and ends the cursor.
    pub async fn next(&mut self) -> Result<Option<WorkItem>> {
        if self.finished {
            return Ok(None);
        }

        self.client.active().end();

        match self.client.claim_next_item(self.workqueue_id).await {
            Ok(Some(item)) => {
                self.client.active().start(item.id);
                debug!(
                    work_item_id = %item.id,
                    workqueue_id = %self.workqueue_id,
                    "claimed work item"
                );
                Ok(Some(item))
            }
            Ok(None) => {
                self.finished = true;
                debug!(workqueue_id = %self.workqueue_id, "workqueue exhausted");
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

fn record_queue_operation(workqueue_id: WorkqueueId, operation: &'static str) {
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("workqueue", workqueue_id.0),
            KeyValue::new("operation", operation),
        ],
    );
}
