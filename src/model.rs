//! Core data model.
//!
//! Typed snapshots of what the automation server returns. The server is
//! authoritative for all of it: a `WorkItem` here is the claiming worker's
//! local copy, kept in step with the server only by the status and data
//! updates issued through [`crate::Client`].
//!
//! Unknown response fields are ignored so newer servers stay compatible.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Server timestamps are ISO 8601, with or without an offset. A timestamp
/// without one is taken as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .or_else(|_| raw.parse::<NaiveDateTime>().map(|naive| naive.and_utc()))
    }
}

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub i64);

impl std::fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for workqueue IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkqueueId(pub i64);

impl std::fmt::Display for WorkqueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session / Process
// ---------------------------------------------------------------------------

/// A dispatched run of a process on a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub process_id: i64,
    pub resource_id: i64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub dispatched_at: DateTime<Utc>,
    pub status: String,
    pub stop_requested: bool,
    pub deleted: bool,
    /// Raw parameter string as configured on the server.
    pub parameters: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// An automation process definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub requirements: String,
    pub target_type: String,
    pub target_source: String,
    pub target_credentials_id: Option<i64>,
    pub credentials_id: Option<i64>,
    /// Queue this process draws its work items from, if it has one.
    #[serde(default)]
    pub workqueue_id: Option<WorkqueueId>,
    pub deleted: bool,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Workqueue
// ---------------------------------------------------------------------------

/// A server-managed pool of work items. Holds no items itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workqueue {
    pub id: WorkqueueId,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub deleted: bool,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// Filter for clearing a workqueue. Unset fields are sent as `null`,
/// which the server reads as "any".
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearFilter {
    pub workitem_status: Option<WorkItemStatus>,
    pub days_older_than: Option<u32>,
}

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of work claimed from a workqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,

    /// Arbitrary payload. Opaque to this crate.
    pub data: serde_json::Value,

    /// Caller-supplied reference. Not guaranteed unique.
    pub reference: String,

    pub locked: bool,

    pub status: WorkItemStatus,

    /// Free-text message set alongside the last status change.
    pub message: String,

    pub workqueue_id: WorkqueueId,

    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WorkItem(id={}, reference={}, data={})",
            self.id, self.reference, self.data
        )
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a work item, as the server spells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkItemStatus {
    New,
    InProgress,
    Completed,
    Failed,
    PendingUserAction,
    /// A status this client does not know about.
    Other(String),
}

impl WorkItemStatus {
    /// Completed or failed. Automatic transitions no longer apply.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkItemStatus::Completed | WorkItemStatus::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            WorkItemStatus::New => "new",
            WorkItemStatus::InProgress => "in progress",
            WorkItemStatus::Completed => "completed",
            WorkItemStatus::Failed => "failed",
            WorkItemStatus::PendingUserAction => "pending user action",
            WorkItemStatus::Other(s) => s,
        }
    }
}

impl From<&str> for WorkItemStatus {
    fn from(s: &str) -> Self {
        match s {
            "new" => WorkItemStatus::New,
            "in progress" => WorkItemStatus::InProgress,
            "completed" => WorkItemStatus::Completed,
            "failed" => WorkItemStatus::Failed,
            "pending user action" => WorkItemStatus::PendingUserAction,
            other => WorkItemStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for WorkItemStatus {
    fn from(s: String) -> Self {
        WorkItemStatus::from(s.as_str())
    }
}

impl From<WorkItemStatus> for String {
    fn from(status: WorkItemStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Credential / Asset
// ---------------------------------------------------------------------------

/// A named secret. The password never shows up in `Debug` output.
#[derive(Debug, Deserialize)]
pub struct Credential {
    pub id: i64,
    pub name: String,
    pub data: serde_json::Value,
    pub username: String,
    pub password: SecretString,
    pub deleted: bool,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// A named configuration blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub name: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub deleted: bool,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}
