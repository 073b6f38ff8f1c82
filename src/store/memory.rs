//! In-memory stores, used by tests and single-process hosts.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{PayloadStore, ResultStore};
use crate::error::Result;
use crate::model::{PayloadRecord, ResultRecord};

/// A record addressable by key.
pub trait Keyed: Clone + Send + Sync {
    fn key(&self) -> &str;
}

impl Keyed for PayloadRecord {
    fn key(&self) -> &str {
        &self.key
    }
}

impl Keyed for ResultRecord {
    fn key(&self) -> &str {
        &self.key
    }
}

pub struct MemoryStore<R> {
    records: RwLock<HashMap<String, R>>,
}

pub type MemoryPayloadStore = MemoryStore<PayloadRecord>;
pub type MemoryResultStore = MemoryStore<ResultRecord>;

impl<R: Keyed> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn put(&self, record: R) {
        self.records
            .write()
            .insert(record.key().to_string(), record);
    }

    fn fetch(&self, key: &str) -> Option<R> {
        self.records.read().get(key).cloned()
    }

    fn remove(&self, key: &str) {
        self.records.write().remove(key);
    }

    fn has(&self, key: &str) -> bool {
        self.records.read().contains_key(key)
    }
}

impl<R: Keyed> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayloadStore for MemoryStore<PayloadRecord> {
    async fn store(&self, payload: PayloadRecord) -> Result<()> {
        self.put(payload);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<PayloadRecord>> {
        Ok(self.fetch(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.has(key))
    }
}

#[async_trait]
impl ResultStore for MemoryStore<ResultRecord> {
    async fn store(&self, result: ResultRecord) -> Result<()> {
        self.put(result);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ResultRecord>> {
        Ok(self.fetch(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.has(key))
    }
}
