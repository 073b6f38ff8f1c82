//! In-memory reference queue.
//!
//! Each worker type gets its own lane (queued FIFO + leased set) so that
//! traffic on one type never contends with another. Expired leases are
//! swept back into their queue on every operation rather than on a timer.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::WorkQueue;
use crate::error::Result;
use crate::model::WorkRecord;
use crate::model::params::{LEASE_TOKEN, MESSAGE_ID};
use crate::telemetry::metrics;

/// How long a lease may be held before the item is reclaimed.
pub const LEASE_TIMEOUT: Duration = Duration::from_secs(300);

struct Lease {
    token: String,
    leased_at: Instant,
    item: WorkRecord,
}

#[derive(Default)]
struct Lane {
    queued: Mutex<VecDeque<WorkRecord>>,
    /// Keyed by `MessageId`.
    leased: Mutex<HashMap<String, Lease>>,
}

impl Lane {
    fn push(&self, item: WorkRecord) {
        self.queued.lock().push_back(item);
    }

    /// Remove the lease for `item` if its token still matches.
    fn take_lease(&self, item: &WorkRecord) -> Option<Lease> {
        let (Some(message_id), Some(token)) = (item.message_id(), item.lease_token()) else {
            return None;
        };
        let mut leased = self.leased.lock();
        match leased.get(message_id).map(|lease| lease.token == token) {
            Some(true) => leased.remove(message_id),
            Some(false) => {
                debug!(key = %item.key, "stale lease token, ignoring");
                None
            }
            None => None,
        }
    }
}

/// Process-local queue. State lives in the instance; nothing survives a restart.
pub struct MemoryWorkQueue {
    lanes: DashMap<String, Arc<Lane>>,
    lease_timeout: Duration,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::with_lease_timeout(LEASE_TIMEOUT)
    }

    pub fn with_lease_timeout(lease_timeout: Duration) -> Self {
        Self {
            lanes: DashMap::new(),
            lease_timeout,
        }
    }

    /// Items waiting to be leased for `worker_type`.
    pub fn queued_len(&self, worker_type: &str) -> usize {
        self.existing_lane(worker_type)
            .map_or(0, |lane| lane.queued.lock().len())
    }

    /// Items currently leased for `worker_type`.
    pub fn leased_len(&self, worker_type: &str) -> usize {
        self.existing_lane(worker_type)
            .map_or(0, |lane| lane.leased.lock().len())
    }

    /// Whether an item with `key` is queued or leased for `worker_type`.
    pub fn contains(&self, worker_type: &str, key: &str) -> bool {
        let Some(lane) = self.existing_lane(worker_type) else {
            return false;
        };
        let queued = lane.queued.lock().iter().any(|item| item.key == key);
        queued || lane.leased.lock().values().any(|l| l.item.key == key)
    }

    fn lane(&self, worker_type: &str) -> Arc<Lane> {
        if let Some(lane) = self.lanes.get(worker_type) {
            return Arc::clone(lane.value());
        }
        let entry = self.lanes.entry(worker_type.to_string()).or_default();
        Arc::clone(entry.value())
    }

    fn existing_lane(&self, worker_type: &str) -> Option<Arc<Lane>> {
        self.lanes
            .get(worker_type)
            .map(|lane| Arc::clone(lane.value()))
    }

    /// Move every lease older than the timeout back to its queue.
    fn reclaim_expired(&self) {
        let lanes: Vec<(String, Arc<Lane>)> = self
            .lanes
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (worker_type, lane) in lanes {
            let expired: Vec<Lease> = {
                let mut leased = lane.leased.lock();
                let ids: Vec<String> = leased
                    .iter()
                    .filter(|(_, lease)| lease.leased_at.elapsed() > self.lease_timeout)
                    .map(|(id, _)| id.clone())
                    .collect();
                ids.iter().filter_map(|id| leased.remove(id)).collect()
            };

            for lease in expired {
                warn!(
                    key = %lease.item.key,
                    worker_type = %worker_type,
                    "lease expired, returning item to queue"
                );
                metrics::queue_operations().add(
                    1,
                    &[
                        KeyValue::new("worker_type", worker_type.clone()),
                        KeyValue::new("operation", "reclaim"),
                    ],
                );
                lane.push(lease.item);
            }
        }
    }

    fn count(worker_type: &str, operation: &'static str) {
        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("worker_type", worker_type.to_string()),
                KeyValue::new("operation", operation),
            ],
        );
    }
}

impl Default for MemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn send(&self, mut item: WorkRecord) -> Result<WorkRecord> {
        self.reclaim_expired();

        item.extra_params.remove(LEASE_TOKEN);
        item.extra_params
            .set(MESSAGE_ID, Uuid::new_v4().to_string());

        self.lane(&item.worker_type).push(item.clone());
        Self::count(&item.worker_type, "send");
        debug!(key = %item.key, worker_type = %item.worker_type, "item queued");
        Ok(item)
    }

    async fn lease_next(&self, worker_type: &str) -> Result<Option<WorkRecord>> {
        self.reclaim_expired();

        let lane = self.lane(worker_type);
        let Some(item) = lane.queued.lock().pop_front() else {
            Self::count(worker_type, "lease_empty");
            return Ok(None);
        };

        // Items only enter a lane through `send`, which always stamps one.
        let message_id = item
            .message_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let token = Uuid::new_v4().to_string();

        let mut leased_item = item;
        leased_item.extra_params.set(MESSAGE_ID, message_id.clone());
        leased_item.extra_params.set(LEASE_TOKEN, token.clone());

        let mut stored = leased_item.clone();
        stored.extra_params.remove(LEASE_TOKEN);
        lane.leased.lock().insert(
            message_id,
            Lease {
                token,
                leased_at: Instant::now(),
                item: stored,
            },
        );

        Self::count(worker_type, "lease");
        Ok(Some(leased_item))
    }

    async fn delete(&self, item: &WorkRecord) -> Result<()> {
        if let Some(lane) = self.existing_lane(&item.worker_type) {
            if lane.take_lease(item).is_some() {
                Self::count(&item.worker_type, "delete");
                debug!(key = %item.key, worker_type = %item.worker_type, "item deleted");
            }
        }
        self.reclaim_expired();
        Ok(())
    }

    async fn release(&self, item: &WorkRecord) -> Result<()> {
        if let Some(lane) = self.existing_lane(&item.worker_type) {
            if let Some(lease) = lane.take_lease(item) {
                lane.push(lease.item);
                Self::count(&item.worker_type, "release");
                debug!(key = %item.key, worker_type = %item.worker_type, "item released");
            }
        }
        self.reclaim_expired();
        Ok(())
    }
}
