//! Worker port and registry.
//!
//! A worker handles exactly one worker type. The engine resolves the worker
//! for each leased item by its `worker_type`; items with no registered
//! worker are handed back to the queue for another node.

pub mod echo;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::model::{PayloadRecord, ResultRecord, WorkRecord};

pub use echo::EchoWorker;

#[async_trait]
pub trait Worker: Send + Sync {
    /// The worker type this implementation handles.
    fn worker_type(&self) -> &str;

    /// Process one item.
    ///
    /// `Ok(None)` finishes the item without storing a result. A result with
    /// `postpone` set puts the item back on the queue. An error counts as a
    /// failed attempt.
    async fn process(
        &self,
        item: &WorkRecord,
        payload: Option<&PayloadRecord>,
    ) -> anyhow::Result<Option<ResultRecord>>;
}

/// Registered workers, indexed by worker type.
#[derive(Clone, Default)]
pub struct WorkerSet {
    workers: BTreeMap<String, Arc<dyn Worker>>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker. Fails if its type is already registered.
    pub fn register(&mut self, worker: Arc<dyn Worker>) -> Result<()> {
        let worker_type = worker.worker_type().to_string();
        if self.workers.contains_key(&worker_type) {
            return Err(Error::Config(format!(
                "worker type {worker_type:?} registered twice"
            )));
        }
        self.workers.insert(worker_type, worker);
        Ok(())
    }

    pub fn get(&self, worker_type: &str) -> Option<&Arc<dyn Worker>> {
        self.workers.get(worker_type)
    }

    pub fn worker_types(&self) -> impl Iterator<Item = &str> {
        self.workers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.workers.keys()).finish()
    }
}
