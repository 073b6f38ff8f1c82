//! Metric instrument factories.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider these are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("batchq")
}

/// Counter: queue operations.
/// Labels: `worker_type`, `operation` (send | lease | lease_empty | delete |
/// release | reclaim).
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("batchq.queue.operations")
        .with_description("Number of work queue operations")
        .build()
}

/// Counter: how consumed items ended.
/// Labels: `worker_type`, `outcome` (completed | postponed | retried |
/// abandoned | released).
pub fn work_outcomes() -> Counter<u64> {
    meter()
        .u64_counter("batchq.work.outcomes")
        .with_description("Outcomes of processed work items")
        .build()
}

/// Counter: consumer pool resizes.
/// Labels: `direction` ("up" | "down").
pub fn pool_adjustments() -> Counter<u64> {
    meter()
        .u64_counter("batchq.pool.adjustments")
        .with_description("Consumer pool size adjustments")
        .build()
}

/// Histogram: worker execution time in milliseconds.
/// Labels: `worker_type`.
pub fn work_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("batchq.work.duration_ms")
        .with_description("Worker execution time")
        .with_unit("ms")
        .build()
}
