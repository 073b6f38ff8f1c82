//! Lease-based work queue port.
//!
//! A queue holds one FIFO per worker type. Leasing hides an item from other
//! callers until it is deleted, released, or its lease expires.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::WorkRecord;

pub use memory::{LEASE_TIMEOUT, MemoryWorkQueue};

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue at the tail of the item's worker-type queue. Returns the item
    /// annotated with its delivery identifier (`MessageId`).
    async fn send(&self, item: WorkRecord) -> Result<WorkRecord>;

    /// Lease the head item for `worker_type`, or `None` when nothing is queued.
    /// The returned item carries a `LeaseToken`.
    async fn lease_next(&self, worker_type: &str) -> Result<Option<WorkRecord>>;

    /// Remove a leased item permanently. No-op if the item is not leased.
    async fn delete(&self, item: &WorkRecord) -> Result<()>;

    /// Return a leased item to the tail of its queue. No-op if not leased.
    async fn release(&self, item: &WorkRecord) -> Result<()>;
}
