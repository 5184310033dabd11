//! Work item updates: payload and status.
//!
//! Each update is written to the server first and mirrored into the local
//! snapshot only after the server accepted it. A failed call leaves the
//! snapshot exactly as it was.

use super::Client;
use crate::error::Result;
use crate::model::{WorkItem, WorkItemId, WorkItemStatus};
use crate::telemetry::metrics;
use crate::telemetry::work::record_status_transition;
use opentelemetry::KeyValue;
use reqwest::Method;
use serde::Serialize;
use tracing::{Span, info};

#[derive(Serialize)]
struct DataBody<'a> {
    data: &'a serde_json::Value,
    reference: &'a str,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    status: &'a str,
    message: &'a str,
}

impl Client {
    /// Replace the item's payload. The reference is sent unchanged.
    pub async fn update_item_data(
        &self,
        item: &mut WorkItem,
        data: serde_json::Value,
    ) -> Result<()> {
        self.send(
            self.request(Method::PUT, &format!("/workitems/{}", item.id))
                .json(&DataBody {
                    data: &data,
                    reference: &item.reference,
                }),
        )
        .await?;
        item.data = data;
        Ok(())
    }

    /// Set status and message on the server, then on the snapshot.
    pub async fn update_item_status(
        &self,
        item: &mut WorkItem,
        status: WorkItemStatus,
        message: &str,
    ) -> Result<()> {
        self.set_item_status(item.id, &status, message).await?;

        record_status_transition(&Span::current(), item.status.as_str(), status.as_str());
        metrics::status_transitions().add(
            1,
            &[
                KeyValue::new("from", item.status.to_string()),
                KeyValue::new("to", status.to_string()),
            ],
        );
        info!(
            work_item_id = %item.id,
            status = %status,
            status_message = message,
            "work item status updated"
        );

        item.status = status;
        item.message = message.to_string();
        Ok(())
    }

    /// Set status and message on the server for an item known only by id.
    pub async fn set_item_status(
        &self,
        id: WorkItemId,
        status: &WorkItemStatus,
        message: &str,
    ) -> Result<()> {
        self.send(
            self.request(Method::PUT, &format!("/workitems/{id}/status"))
                .json(&StatusBody {
                    status: status.as_str(),
                    message,
                }),
        )
        .await?;
        Ok(())
    }

    pub async fn complete(&self, item: &mut WorkItem, message: &str) -> Result<()> {
        self.update_item_status(item, WorkItemStatus::Completed, message)
            .await
    }

    pub async fn fail(&self, item: &mut WorkItem, message: &str) -> Result<()> {
        self.update_item_status(item, WorkItemStatus::Failed, message)
            .await
    }

    /// Park the item for a human. Not terminal, but it stops auto-completion.
    pub async fn pending_user(&self, item: &mut WorkItem, message: &str) -> Result<()> {
        self.update_item_status(item, WorkItemStatus::PendingUserAction, message)
            .await
    }
}
