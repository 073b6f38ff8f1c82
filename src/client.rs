//! Scheduling side of the system.
//!
//! A [`BatchClient`] puts work on the queue and reads results back. It shares
//! the queue and stores with the nodes running the engine.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::model::params::NO_DATA;
use crate::model::{ExtraParams, PayloadRecord, ResultRecord, WorkRecord, derived_key};
use crate::queue::WorkQueue;
use crate::registry::Components;
use crate::store::{PayloadStore, ResultStore};

#[derive(Clone)]
pub struct BatchClient {
    queue: Arc<dyn WorkQueue>,
    payloads: Arc<dyn PayloadStore>,
    results: Arc<dyn ResultStore>,
}

impl BatchClient {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        payloads: Arc<dyn PayloadStore>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            queue,
            payloads,
            results,
        }
    }

    pub fn from_components(components: &Components) -> Self {
        Self::new(
            Arc::clone(&components.queue),
            Arc::clone(&components.payloads),
            Arc::clone(&components.results),
        )
    }

    /// Schedule one job.
    ///
    /// With `data` the payload is stored under `key-worker_type` before the
    /// item is queued; without it the item is marked `NoData`. Returns the
    /// record as sent, including its delivery id.
    #[instrument(skip(self, data, extra_params), fields(has_data = data.is_some()))]
    pub async fn schedule_work(
        &self,
        key: &str,
        worker_type: &str,
        data: Option<Vec<u8>>,
        extra_params: ExtraParams,
    ) -> Result<WorkRecord> {
        let mut item = WorkRecord::new(key, worker_type);
        item.extra_params = extra_params;

        match data {
            Some(data) => {
                self.payloads
                    .store(PayloadRecord::new(derived_key(key, worker_type), data))
                    .await?;
            }
            None => item.extra_params.set(NO_DATA, "true"),
        }

        let sent = self.queue.send(item).await?;
        debug!(message_id = ?sent.message_id(), "work scheduled");
        Ok(sent)
    }

    /// True once a result exists for the derived key.
    pub async fn finished_processing(&self, derived_key: &str) -> Result<bool> {
        self.results.exists(derived_key).await
    }

    pub async fn get_result(&self, derived_key: &str) -> Result<Option<ResultRecord>> {
        self.results.get(derived_key).await
    }

    /// Store a result directly, bypassing the engine.
    pub async fn store_result(
        &self,
        key: &str,
        data: Vec<u8>,
        extra_params: ExtraParams,
    ) -> Result<()> {
        let mut result = ResultRecord::new(data);
        result.key = key.to_string();
        result.extra_params = extra_params;
        self.results.store(result).await
    }
}
