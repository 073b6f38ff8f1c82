//! Integration tests for telemetry initialization and span helpers.

use batchq::telemetry::metrics;
use batchq::telemetry::work::{record_outcome, start_work_span};
use batchq::telemetry::{TelemetryConfig, init_telemetry};
use opentelemetry::KeyValue;

#[test]
fn telemetry_initializes_without_endpoint() {
    // The global subscriber can only be set once per process; a second
    // init in the same binary returns Err, which is fine here.
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "batchq-test".to_string(),
        default_filter: "warn".to_string(),
    });
}

#[test]
fn work_span_creates_and_records_outcome() {
    let span = start_work_span("resize", "job-1", 3);
    record_outcome(&span, "completed");
}

#[test]
fn instruments_are_usable_without_a_provider() {
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("worker_type", "resize"),
            KeyValue::new("operation", "send"),
        ],
    );
    metrics::work_outcomes().add(1, &[KeyValue::new("outcome", "retried")]);
    metrics::pool_adjustments().add(1, &[KeyValue::new("direction", "down")]);
    metrics::work_duration_ms().record(12.5, &[KeyValue::new("worker_type", "resize")]);
}
