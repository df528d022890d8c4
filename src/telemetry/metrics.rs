//! Metric instrument factories for pipeline-desk.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"pipeline-desk"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for pipeline-desk instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("pipeline-desk")
}

/// Counter: queue rows classified on each reconciliation.
/// Labels: `class` ("pending" | "processing" | "stuck").
pub fn queue_classified() -> Counter<u64> {
    meter()
        .u64_counter("desk.queue.classified")
        .with_description("Queue rows classified per reconciliation")
        .build()
}

/// Counter: dispatched remediation actions.
/// Labels: `action`, `result` ("ok" | "error" | "refused").
pub fn actions() -> Counter<u64> {
    meter()
        .u64_counter("desk.actions")
        .with_description("Number of remediation actions dispatched")
        .build()
}

/// Counter: failed view fetches.
/// Labels: `view` ("queue" | "pending" | "activity").
pub fn fetch_failures() -> Counter<u64> {
    meter()
        .u64_counter("desk.fetch.failures")
        .with_description("Number of failed view fetches")
        .build()
}

/// Counter: calls made to the remote gateway.
/// Labels: `operation`.
pub fn gateway_calls() -> Counter<u64> {
    meter()
        .u64_counter("desk.gateway.calls")
        .with_description("Number of remote gateway calls")
        .build()
}

/// Histogram: view fetch duration in milliseconds.
/// Labels: `view`.
pub fn fetch_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("desk.fetch.duration_ms")
        .with_description("View fetch duration in milliseconds")
        .with_unit("ms")
        .build()
}
