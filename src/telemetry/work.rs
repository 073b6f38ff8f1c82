//! Work processing span helpers.

use tracing::Span;

/// Start a span covering one consumed item.
///
/// `work.outcome` is declared empty and filled by [`record_outcome`].
pub fn start_work_span(worker_type: &str, key: &str, consumer: usize) -> Span {
    tracing::info_span!(
        "work.process",
        "work.worker_type" = worker_type,
        "work.key" = key,
        "work.consumer" = consumer,
        "work.outcome" = tracing::field::Empty,
    )
}

/// Record how the item ended on its span.
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("work.outcome", outcome);
}
