//! Work item lifecycle: scoped processing with a guaranteed final report.
//!
//! [`Client::process`] wraps the caller's work on one claimed item. On the way
//! out it decides the outcome from two things: whether the work returned an
//! error, and whether the item is still `in progress`.
//!
//! | work result | status after work       | reported                       |
//! |-------------|-------------------------|--------------------------------|
//! | `Err(e)`    | anything                | `failed`, message `e.to_string()` |
//! | `Ok(_)`     | `in progress`           | `completed`, message `Completed` |
//! | `Ok(_)`     | set by the caller       | nothing more                   |
//!
//! The active work item tag is cleared on every exit path, including panics
//! and cancellation of the returned future.

use crate::active::ActiveGuard;
use crate::client::Client;
use crate::error::Error;
use crate::model::{WorkItem, WorkItemStatus};
use crate::telemetry::work::start_item_span;
use tracing::{Instrument, debug, error};

impl Client {
    /// Run `work` on a claimed item and report its outcome to the server.
    ///
    /// An error returned by `work` is reported as `failed` and then returned
    /// unchanged. If reporting that failure itself fails, the report error is
    /// logged and the original error still wins. If `work` succeeds but the
    /// automatic `completed` report fails, that report error is returned.
    ///
    /// ```no_run
    /// # use ats_client::{Client, model::WorkqueueId};
    /// # async fn run(client: Client, id: WorkqueueId) -> ats_client::Result<()> {
    /// let mut items = client.items(id);
    /// while let Some(mut item) = items.next().await? {
    ///     client
    ///         .process(&mut item, async |item| {
    ///             if item.data.get("skip").is_some() {
    ///                 client.pending_user(item, "needs review").await?;
    ///             }
    ///             Ok::<_, ats_client::Error>(())
    ///         })
    ///         .await?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn process<T, E, F>(&self, item: &mut WorkItem, work: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut WorkItem) -> Result<T, E>,
        E: std::fmt::Display + From<Error>,
    {
        let span = start_item_span(item.workqueue_id, item.id);
        let _active = ActiveGuard::start(self.active(), item.id);

        async move {
            debug!(work_item_id = %item.id, "processing {item}");

            match work(&mut *item).await {
                Err(e) => {
                    error!(
                        work_item_id = %item.id,
                        error = %e,
                        error_type = std::any::type_name::<E>(),
                        "an error occurred while processing {item}"
                    );
                    if let Err(report) = self.fail(item, &e.to_string()).await {
                        error!(
                            work_item_id = %item.id,
                            error = %report,
                            "could not report failure"
                        );
                    }
                    Err(e)
                }
                Ok(value) => {
                    if item.status == WorkItemStatus::InProgress {
                        self.complete(item, "Completed").await?;
                    }
                    Ok::<T, E>(value)
                }
            }
        }
        .instrument(span)
        .await
    }
}
