//! Built-in worker that returns its payload unchanged.

use async_trait::async_trait;

use super::Worker;
use crate::model::{PayloadRecord, ResultRecord, WorkRecord};

pub struct EchoWorker {
    worker_type: String,
}

impl EchoWorker {
    pub const DEFAULT_TYPE: &'static str = "echo";

    pub fn new() -> Self {
        Self::with_type(Self::DEFAULT_TYPE)
    }

    pub fn with_type(worker_type: impl Into<String>) -> Self {
        Self {
            worker_type: worker_type.into(),
        }
    }
}

impl Default for EchoWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Worker for EchoWorker {
    fn worker_type(&self) -> &str {
        &self.worker_type
    }

    async fn process(
        &self,
        item: &WorkRecord,
        payload: Option<&PayloadRecord>,
    ) -> anyhow::Result<Option<ResultRecord>> {
        let data = payload.map(|p| p.data.clone()).unwrap_or_default();
        Ok(Some(
            ResultRecord::new(data).with_param("EchoedFrom", item.key.clone()),
        ))
    }
}
