//! Consumer loop and the per-item outcome policy.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use super::{Inner, Outcome};
use crate::error::Result;
use crate::model::params::LEASE_TOKEN;
use crate::model::{PayloadRecord, WorkRecord};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_outcome, start_work_span};

pub(super) async fn run(engine: Arc<Inner>, index: usize, stop: CancellationToken) {
    info!(consumer = index, "consumer started");

    while !stop.is_cancelled() {
        engine
            .events
            .update(format!("Waiting for an item from the queue {index}"));

        let item = {
            let mut rx = tokio::select! {
                _ = stop.cancelled() => break,
                rx = engine.handoff_rx.lock() => rx,
            };
            tokio::select! {
                _ = stop.cancelled() => break,
                item = rx.recv() => item,
            }
        };
        let Some(item) = item else {
            break;
        };
        engine.events.update(format!("Item was found {index}"));

        match engine.process(index, item).await {
            Ok(Outcome::Released) => continue,
            Ok(_) => {}
            Err(e) => {
                error!(consumer = index, "processing failed: {e}");
                engine.events.error(e.to_string());
            }
        }

        engine.maybe_rebalance();
    }

    info!(consumer = index, "consumer stopped");
}

impl Inner {
    /// Route one leased item to its worker and apply the outcome.
    ///
    /// Store and queue failures are returned as-is; the item's lease is left
    /// to expire so the queue redelivers it.
    pub(super) async fn process(&self, consumer: usize, item: WorkRecord) -> Result<Outcome> {
        let span = start_work_span(&item.worker_type, &item.key, consumer);
        let outcome = self
            .process_inner(consumer, item)
            .instrument(span.clone())
            .await?;
        record_outcome(&span, outcome.as_str());
        Ok(outcome)
    }

    async fn process_inner(&self, consumer: usize, item: WorkRecord) -> Result<Outcome> {
        let Some(worker) = self.workers.get(&item.worker_type).cloned() else {
            warn!(worker_type = %item.worker_type, "no worker for type, releasing");
            self.events.update(format!(
                "Worker type {} is not available in this node, releasing item back to the queue {consumer}",
                item.worker_type
            ));
            self.queue.release(&item).await?;
            self.count_outcome(&item, Outcome::Released);
            return Ok(Outcome::Released);
        };

        let payload = if item.has_no_data() {
            None
        } else {
            let derived = item.derived_key();
            self.events
                .update(format!("Getting data: {} {consumer}", item.worker_type));
            let payload = self.payloads.get(&derived).await?;
            match &payload {
                Some(p) => self.events.update(format!(
                    "Data received, size in bytes {} {consumer}",
                    p.data.len()
                )),
                None => warn!(key = %derived, "payload missing, processing without it"),
            }
            payload
        };

        self.events.update(format!("Started processing {consumer}"));
        let started = Instant::now();
        let processed = worker.process(&item, payload.as_ref()).await;
        metrics::work_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("worker_type", item.worker_type.clone())],
        );

        let outcome = match processed {
            Err(err) => {
                error!(key = %item.key, worker_type = %item.worker_type, "worker failed: {err:#}");
                self.events
                    .error(format!("worker {} failed on {}: {err:#}", item.worker_type, item.key));
                self.retry_or_abandon(consumer, &item, payload).await?
            }
            Ok(Some(result)) if result.postpone => {
                info!(key = %item.key, "processing postponed");
                self.events
                    .update(format!("Processing postponed {consumer}"));
                self.queue.release(&item).await?;
                Outcome::Postponed
            }
            Ok(Some(mut result)) => {
                self.delete_item_and_payload(&item, payload.is_some())
                    .await?;
                result.key = item.derived_key();
                self.events
                    .update(format!("Finished processing, storing result {consumer}"));
                self.results.store(result).await?;
                self.events
                    .update(format!("Finished result is stored {consumer}"));
                info!(key = %item.key, worker_type = %item.worker_type, "result stored");
                Outcome::Completed
            }
            Ok(None) => {
                self.delete_item_and_payload(&item, payload.is_some())
                    .await?;
                info!(key = %item.key, worker_type = %item.worker_type, "processed without result");
                Outcome::Completed
            }
        };

        self.count_outcome(&item, outcome);
        Ok(outcome)
    }

    async fn retry_or_abandon(
        &self,
        consumer: usize,
        item: &WorkRecord,
        payload: Option<PayloadRecord>,
    ) -> Result<Outcome> {
        self.delete_item_and_payload(item, payload.is_some()).await?;

        let tried = item.tried();
        if tried < self.config.retry_count {
            let attempt = tried + 1;
            let mut retry = item.clone();
            retry.extra_params.remove(LEASE_TOKEN);
            retry.set_tried(attempt);
            warn!(key = %retry.key, attempt, "processing failed, retrying");
            self.events.update(format!(
                "Processing failed, retrying for the {attempt} time {consumer}"
            ));
            // The resent item must find its input again.
            if let Some(payload) = payload {
                self.payloads.store(payload).await?;
            }
            self.queue.send(retry).await?;
            Ok(Outcome::Retried { attempt })
        } else {
            warn!(key = %item.key, tried, "retries exhausted, abandoning item");
            self.events.update(format!(
                "Processing failed, reached max number of trials {tried}, item abandoned {consumer}"
            ));
            Ok(Outcome::Abandoned { tried })
        }
    }

    async fn delete_item_and_payload(&self, item: &WorkRecord, had_payload: bool) -> Result<()> {
        self.queue.delete(item).await?;
        if had_payload {
            self.payloads.delete(&item.derived_key()).await?;
        }
        Ok(())
    }

    fn count_outcome(&self, item: &WorkRecord, outcome: Outcome) {
        metrics::work_outcomes().add(
            1,
            &[
                KeyValue::new("worker_type", item.worker_type.clone()),
                KeyValue::new("outcome", outcome.as_str()),
            ],
        );
    }
}
