//! Audit log shipping: the server-side log correlation sink.
//!
//! [`AuditLogLayer`] is a `tracing_subscriber` layer. For every event it
//! builds an [`AuditLogRecord`] on the spot, stamped with the session id and
//! whatever work item is active at that moment, and hands it to a background
//! task that POSTs it to `/audit-logs`. Emitting never blocks and never fails:
//! records that cannot be delivered, or that arrive while the queue is full,
//! are counted in `ats.audit_log.failures` and dropped.
//!
//! ```no_run
//! # async fn run(client: ats_client::Client) {
//! use ats_client::telemetry::audit::AuditLogLayer;
//! use tracing_subscriber::layer::SubscriberExt as _;
//! use tracing_subscriber::util::SubscriberInitExt as _;
//!
//! let (layer, handle) = AuditLogLayer::spawn(client, 17);
//! tracing_subscriber::registry().with(layer).init();
//!
//! tracing::info!(rows = 42, "imported batch");
//! handle.flush().await;
//! # }
//! ```

use crate::active::ActiveWorkItem;
use crate::client::{Client, HTTP_TARGET};
use crate::model::WorkItemId;
use crate::telemetry::metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Records waiting for delivery before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Crates whose events describe the transport itself. Shipping them would
/// feed the shipper its own traffic.
const TRANSPORT_CRATES: &[&str] = &[
    "axum",
    "h2",
    "hyper",
    "hyper_util",
    "opentelemetry",
    "opentelemetry_sdk",
    "reqwest",
    "rustls",
    "tonic",
    "tower",
    "tower_http",
];

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The document the server's `/audit-logs` endpoint accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogRecord {
    pub session_id: Option<i64>,
    pub workitem_id: Option<WorkItemId>,
    pub message: String,
    pub level: String,
    pub logger_name: String,
    pub module: Option<String>,
    pub function_name: Option<String>,
    pub line_number: Option<u32>,
    pub exception_type: Option<String>,
    pub exception_message: Option<String>,
    pub traceback: Option<String>,
    pub structured_data: Option<Map<String, Value>>,
    pub event_timestamp: DateTime<Utc>,
}

impl AuditLogRecord {
    /// Convert a tracing event.
    ///
    /// The `message` field becomes the message. A field named `error` fills
    /// `exception_message` (and `traceback`, when recorded as an error value
    /// with a source chain); `error_type` fills `exception_type`. All other
    /// fields land in `structured_data`.
    pub fn from_event(
        event: &Event<'_>,
        session_id: Option<i64>,
        workitem_id: Option<WorkItemId>,
    ) -> Self {
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        Self {
            session_id,
            workitem_id,
            message: visitor.message.unwrap_or_default(),
            level: level_name(metadata.level()).to_string(),
            logger_name: metadata.target().to_string(),
            module: metadata
                .module_path()
                .or(metadata.file())
                .map(str::to_string),
            function_name: None,
            line_number: metadata.line(),
            exception_type: visitor.exception_type,
            exception_message: visitor.exception_message,
            traceback: visitor.traceback,
            structured_data: (!visitor.fields.is_empty()).then_some(visitor.fields),
            event_timestamp: Utc::now(),
        }
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG | Level::TRACE => "DEBUG",
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    exception_type: Option<String>,
    exception_message: Option<String>,
    traceback: Option<String>,
    fields: Map<String, Value>,
}

impl RecordVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        match field.name() {
            "message" => self.message = Some(text(value)),
            "error" => self.exception_message = Some(text(value)),
            "error_type" => self.exception_type = Some(text(value)),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

fn text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Visit for RecordVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let number = serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.insert(field, number);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if field.name() == "error" {
            let mut chain = vec![value.to_string()];
            let mut source = value.source();
            while let Some(cause) = source {
                chain.push(format!("Caused by: {cause}"));
                source = cause.source();
            }
            self.traceback = Some(chain.join("\n"));
        }
        self.insert(field, Value::String(value.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

enum Command {
    Ship(Box<AuditLogRecord>),
    Flush(oneshot::Sender<()>),
}

/// Tracing layer that forwards events to the automation server.
pub struct AuditLogLayer {
    tx: mpsc::Sender<Command>,
    session_id: i64,
    active: ActiveWorkItem,
}

/// Lets the owner wait for queued records to be delivered.
#[derive(Clone)]
pub struct AuditLogHandle {
    tx: mpsc::Sender<Command>,
}

impl AuditLogLayer {
    /// Start the shipping task and return the layer feeding it.
    ///
    /// Records are tagged from `client`'s active work item slot. Must be
    /// called from within a tokio runtime.
    pub fn spawn(client: Client, session_id: i64) -> (Self, AuditLogHandle) {
        Self::spawn_with_capacity(client, session_id, DEFAULT_QUEUE_CAPACITY)
    }

    /// [`AuditLogLayer::spawn`] with at most `capacity` records in flight.
    pub fn spawn_with_capacity(
        client: Client,
        session_id: i64,
        capacity: usize,
    ) -> (Self, AuditLogHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let active = client.active().clone();
        tokio::spawn(ship(client, rx));
        (
            Self {
                tx: tx.clone(),
                session_id,
                active,
            },
            AuditLogHandle { tx },
        )
    }
}

impl<S: Subscriber> Layer<S> for AuditLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !is_shippable(event.metadata().target()) {
            return;
        }
        let record =
            AuditLogRecord::from_event(event, Some(self.session_id), self.active.current());
        match self.tx.try_send(Command::Ship(Box::new(record))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => metrics::audit_log_failures().add(1, &[]),
            // The runtime is gone; nothing left to ship to.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

impl AuditLogHandle {
    /// Wait until every record emitted before this call was delivered or dropped.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).await.is_err() {
            return;
        }
        let _ = done.await;
    }
}

fn is_shippable(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    !TRANSPORT_CRATES.contains(&krate)
        && !target.starts_with(HTTP_TARGET)
        && !target.starts_with(module_path!())
}

async fn ship(client: Client, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Ship(record) => {
                if let Err(e) = client.post_audit_log(&record).await {
                    metrics::audit_log_failures().add(1, &[]);
                    // Not through tracing: the event would come straight back here.
                    eprintln!("Failed to send log to {}/audit-logs: {e}", client.base_url());
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
