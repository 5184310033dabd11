//! Metric instrument factories for ats-client.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"ats-client"` meter. Without
//! an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for ats-client instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("ats-client")
}

/// Counter: queue-level operations (add, clear, claim, claim_empty).
/// Labels: `workqueue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("ats.queue.operations")
        .with_description("Number of workqueue operations")
        .build()
}

/// Counter: work item status transitions reported to the server.
/// Labels: `from`, `to`.
pub fn status_transitions() -> Counter<u64> {
    meter()
        .u64_counter("ats.workitem.status_transitions")
        .with_description("Number of work item status transitions")
        .build()
}

/// Histogram: server round-trip duration in milliseconds.
/// Labels: `method`, `status`.
pub fn request_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("ats.request.duration_ms")
        .with_description("Automation server request duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: audit log records the server did not accept.
pub fn audit_log_failures() -> Counter<u64> {
    meter()
        .u64_counter("ats.audit_log.failures")
        .with_description("Audit log records that could not be delivered")
        .build()
}
