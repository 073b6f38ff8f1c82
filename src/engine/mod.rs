//! Processing engine.
//!
//! One producer per registered worker type leases items into a shared
//! handoff buffer of capacity one. A pool of consumers drains the buffer,
//! runs the matching worker and applies the outcome policy. After each item
//! a consumer gives the rebalancer a chance to resize the pool from the
//! resource monitor's averages.
//!
//! Nothing raises on the caller's thread once running: errors from any task
//! are published on the event channel (see [`Engine::subscribe`]).

mod consumer;
mod pool;
mod producer;
pub mod rebalance;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventBus};
use crate::model::WorkRecord;
use crate::monitor::ResourceMonitor;
use crate::queue::WorkQueue;
use crate::registry::Components;
use crate::store::{PayloadStore, ResultStore};
use crate::telemetry::metrics;
use crate::worker::{Worker, WorkerSet};

use pool::ConsumerPool;
use rebalance::{Cooldown, Decision, PoolAdjustment, decide};

/// Capacity of the producer → consumer handoff buffer.
pub const HANDOFF_CAPACITY: usize = 1;

/// How a consumed item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Item and payload deleted; result stored if the worker returned one.
    Completed,
    /// Worker asked to try later; item released, payload kept.
    Postponed,
    /// Worker failed; item resent with `Tried` = `attempt`.
    Retried { attempt: u32 },
    /// Worker failed with no retries left; item and payload discarded.
    Abandoned { tried: u32 },
    /// No worker registered for the item's type; released untouched.
    Released,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Postponed => "postponed",
            Outcome::Retried { .. } => "retried",
            Outcome::Abandoned { .. } => "abandoned",
            Outcome::Released => "released",
        }
    }
}

pub(crate) struct Inner {
    queue: Arc<dyn WorkQueue>,
    payloads: Arc<dyn PayloadStore>,
    results: Arc<dyn ResultStore>,
    workers: WorkerSet,
    monitor: Arc<ResourceMonitor>,
    config: EngineConfig,
    events: EventBus,
    cooldown: Cooldown,
    pool: Mutex<ConsumerPool>,
    handoff_tx: mpsc::Sender<WorkRecord>,
    handoff_rx: tokio::sync::Mutex<mpsc::Receiver<WorkRecord>>,
    cancel: CancellationToken,
    started: AtomicBool,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn add_consumer(self: &Arc<Self>) -> usize {
        let mut pool = self.pool.lock();
        let index = pool.next_index();
        let stop = self.cancel.child_token();
        let handle = tokio::spawn(consumer::run(Arc::clone(self), index, stop.clone()));
        pool.push(index, stop, handle);
        pool.len()
    }

    /// Returns the new pool size, or `None` if the pool is at its floor.
    fn remove_consumer(&self) -> Option<usize> {
        let mut pool = self.pool.lock();
        let retired = pool.retire_newest()?;
        info!(consumer = retired, "consumer asked to stop");
        Some(pool.len())
    }

    /// Hand every item left in the handoff buffer back to the queue.
    async fn release_buffered(&self) -> usize {
        let mut rx = self.handoff_rx.lock().await;
        let mut released = 0;
        while let Ok(item) = rx.try_recv() {
            match self.queue.release(&item).await {
                Ok(()) => released += 1,
                Err(e) => warn!(key = %item.key, "release on shutdown failed: {e}"),
            }
        }
        released
    }

    /// Run a rebalance pass if the cooldown allows one.
    fn maybe_rebalance(self: &Arc<Self>) -> Option<PoolAdjustment> {
        if !self.cooldown.try_claim() {
            return None;
        }

        let avg_memory = self.monitor.average_memory();
        let avg_cpu = self.monitor.average_cpu();

        let adjustment = match decide(
            avg_cpu,
            avg_memory,
            self.config.cpu_threshold,
            self.config.memory_threshold,
        ) {
            Decision::Hold => return None,
            Decision::ShrinkForMemory => self.remove_consumer().map(|size| {
                self.events
                    .update(format!("Worker removed, mem usage is {avg_memory:.1}"));
                PoolAdjustment::Removed { size }
            }),
            Decision::ShrinkForCpu => self.remove_consumer().map(|size| {
                self.events
                    .update(format!("Worker removed, CPU Util is {avg_cpu:.1}"));
                PoolAdjustment::Removed { size }
            }),
            Decision::Grow if self.config.allow_scale_up => {
                let size = self.add_consumer();
                self.events.update(format!(
                    "Worker added, CPU Util is {avg_cpu:.1}  mem usage is {avg_memory:.1}"
                ));
                Some(PoolAdjustment::Added { size })
            }
            Decision::Grow => None,
        };

        if let Some(adjustment) = adjustment {
            let direction = match adjustment {
                PoolAdjustment::Added { .. } => "up",
                PoolAdjustment::Removed { .. } => "down",
            };
            metrics::pool_adjustments().add(1, &[KeyValue::new("direction", direction)]);
            info!(?adjustment, avg_cpu, avg_memory, "consumer pool rebalanced");
        }
        self.events
            .update(format!("----- Worker count {}", self.pool.lock().len()));
        adjustment
    }
}

/// Handle to a processing engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Spawn producers, the initial consumers and the resource sampler.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let inner = &self.inner;
        let mut background = inner.background.lock();
        background.push(inner.monitor.spawn(inner.cancel.child_token()));
        for worker_type in inner.workers.worker_types() {
            background.push(tokio::spawn(producer::run(
                Arc::clone(inner),
                worker_type.to_string(),
                inner.cancel.child_token(),
            )));
        }
        drop(background);

        let initial = inner.config.concurrent_processes.max(1);
        for _ in 0..initial {
            inner.add_consumer();
        }

        info!(
            consumers = initial,
            worker_types = ?inner.workers,
            "engine started"
        );
        Ok(())
    }

    /// Start, wait for the cancellation token, then shut down.
    pub async fn run(&self) -> Result<()> {
        self.start()?;
        self.inner.cancel.cancelled().await;
        self.shutdown().await;
        Ok(())
    }

    /// Cancel every task and wait for in-flight items to finish. Items still
    /// sitting in the handoff buffer are released back to the queue.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = std::mem::take(&mut *self.inner.background.lock());
        handles.extend(self.inner.pool.lock().take_handles());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("engine task ended abnormally: {e}");
            }
        }

        let released = self.inner.release_buffered().await;
        info!(released, "engine stopped");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.pool.lock().len()
    }

    /// Run the rate-limited rebalance check now.
    pub fn rebalance(&self) -> Option<PoolAdjustment> {
        self.inner.maybe_rebalance()
    }

    /// Process one leased item on the caller's task, bypassing the buffer.
    pub async fn process_one(&self, item: WorkRecord) -> Result<Outcome> {
        self.inner.process(0, item).await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}

#[derive(Default)]
pub struct EngineBuilder {
    queue: Option<Arc<dyn WorkQueue>>,
    payloads: Option<Arc<dyn PayloadStore>>,
    results: Option<Arc<dyn ResultStore>>,
    workers: Vec<Arc<dyn Worker>>,
    monitor: Option<Arc<ResourceMonitor>>,
    config: EngineConfig,
    cancel: Option<CancellationToken>,
}

impl EngineBuilder {
    pub fn queue(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn payload_store(mut self, store: Arc<dyn PayloadStore>) -> Self {
        self.payloads = Some(store);
        self
    }

    pub fn result_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.results = Some(store);
        self
    }

    /// Queue and both stores from a registry build.
    pub fn components(self, components: Components) -> Self {
        self.queue(components.queue)
            .payload_store(components.payloads)
            .result_store(components.results)
    }

    pub fn worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn workers(mut self, workers: impl IntoIterator<Item = Arc<dyn Worker>>) -> Self {
        self.workers.extend(workers);
        self
    }

    pub fn monitor(mut self, monitor: Arc<ResourceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a cancellation token with the host (e.g. tied to Ctrl-C).
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let queue = self.queue.ok_or(Error::MissingComponent("work queue"))?;
        let payloads = self
            .payloads
            .ok_or(Error::MissingComponent("payload store"))?;
        let results = self
            .results
            .ok_or(Error::MissingComponent("result store"))?;
        if self.workers.is_empty() {
            return Err(Error::MissingComponent("worker"));
        }

        let mut workers = WorkerSet::new();
        for worker in self.workers {
            workers.register(worker)?;
        }

        let monitor = self
            .monitor
            .unwrap_or_else(|| Arc::new(ResourceMonitor::system()));
        let (handoff_tx, handoff_rx) = mpsc::channel(HANDOFF_CAPACITY);

        Ok(Engine {
            inner: Arc::new(Inner {
                queue,
                payloads,
                results,
                workers,
                monitor,
                events: EventBus::new(self.config.event_capacity),
                cooldown: Cooldown::new(self.config.rebalance_interval),
                config: self.config,
                pool: Mutex::new(ConsumerPool::default()),
                handoff_tx,
                handoff_rx: tokio::sync::Mutex::new(handoff_rx),
                cancel: self.cancel.unwrap_or_default(),
                started: AtomicBool::new(false),
                background: Mutex::new(Vec::new()),
            }),
        })
    }
}
