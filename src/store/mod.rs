//! Keyed blob stores for payloads and results.
//!
//! Both stores address records by the work record's derived key
//! (`key-worker_type`). Missing keys are not errors: `get` returns `None`
//! and `delete` is a no-op.

pub mod fs;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{PayloadRecord, ResultRecord};

pub use fs::{FileSystemPayloadStore, FileSystemResultStore};
pub use memory::{MemoryPayloadStore, MemoryResultStore, MemoryStore};

#[async_trait]
pub trait PayloadStore: Send + Sync {
    async fn store(&self, payload: PayloadRecord) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<PayloadRecord>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn store(&self, result: ResultRecord) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<ResultRecord>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}
