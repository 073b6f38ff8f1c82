//! Named component constructors.
//!
//! Hosts pick the queue and store implementations by name, usually from a
//! TOML selection file:
//!
//! ```toml
//! [components]
//! work_queue = "memory"
//! payload_store = "filesystem"
//! result_store = "filesystem"
//!
//! [settings]
//! payload_dir = "/var/lib/batchq/payloads"
//! result_dir = "/var/lib/batchq/results"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::queue::{MemoryWorkQueue, WorkQueue};
use crate::store::{
    FileSystemPayloadStore, FileSystemResultStore, MemoryPayloadStore, MemoryResultStore,
    PayloadStore, ResultStore,
};

pub const MEMORY: &str = "memory";
pub const FILESYSTEM: &str = "filesystem";

/// Free-form settings handed to every constructor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ComponentSettings(BTreeMap<String, String>);

impl ComponentSettings {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Fails with `Error::Config` when the setting is absent.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::Config(format!("missing component setting {name:?}")))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentNames {
    #[serde(default = "memory")]
    pub work_queue: String,
    #[serde(default = "memory")]
    pub payload_store: String,
    #[serde(default = "memory")]
    pub result_store: String,
}

fn memory() -> String {
    MEMORY.to_string()
}

impl Default for ComponentNames {
    fn default() -> Self {
        Self {
            work_queue: memory(),
            payload_store: memory(),
            result_store: memory(),
        }
    }
}

/// Which implementation to build for each port, plus their settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentSelection {
    #[serde(default)]
    pub components: ComponentNames,
    #[serde(default)]
    pub settings: ComponentSettings,
}

impl ComponentSelection {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
            .map_err(|e| Error::Config(format!("invalid components file {}: {e}", path.display())))
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

/// A built set of ports, ready for an engine or client.
#[derive(Clone)]
pub struct Components {
    pub queue: Arc<dyn WorkQueue>,
    pub payloads: Arc<dyn PayloadStore>,
    pub results: Arc<dyn ResultStore>,
}

type Factory<T> = Box<dyn Fn(&ComponentSettings) -> Result<Arc<T>> + Send + Sync>;

#[derive(Default)]
pub struct ComponentRegistry {
    queues: HashMap<String, Factory<dyn WorkQueue>>,
    payload_stores: HashMap<String, Factory<dyn PayloadStore>>,
    result_stores: HashMap<String, Factory<dyn ResultStore>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `memory` for every port, `filesystem` for both stores (settings
    /// `payload_dir` and `result_dir`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_queue(MEMORY, |_| Ok(Arc::new(MemoryWorkQueue::new())));
        registry.register_payload_store(MEMORY, |_| Ok(Arc::new(MemoryPayloadStore::new())));
        registry.register_result_store(MEMORY, |_| Ok(Arc::new(MemoryResultStore::new())));
        registry.register_payload_store(FILESYSTEM, |settings| {
            Ok(Arc::new(FileSystemPayloadStore::open(
                settings.require("payload_dir")?,
            )?))
        });
        registry.register_result_store(FILESYSTEM, |settings| {
            Ok(Arc::new(FileSystemResultStore::open(
                settings.require("result_dir")?,
            )?))
        });
        registry
    }

    pub fn register_queue<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ComponentSettings) -> Result<Arc<dyn WorkQueue>> + Send + Sync + 'static,
    {
        self.queues.insert(name.into(), Box::new(factory));
    }

    pub fn register_payload_store<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ComponentSettings) -> Result<Arc<dyn PayloadStore>> + Send + Sync + 'static,
    {
        self.payload_stores.insert(name.into(), Box::new(factory));
    }

    pub fn register_result_store<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ComponentSettings) -> Result<Arc<dyn ResultStore>> + Send + Sync + 'static,
    {
        self.result_stores.insert(name.into(), Box::new(factory));
    }

    pub fn build(&self, selection: &ComponentSelection) -> Result<Components> {
        let names = &selection.components;
        let settings = &selection.settings;

        let make_queue = resolve(&self.queues, "work queue", &names.work_queue)?;
        let make_payloads = resolve(&self.payload_stores, "payload store", &names.payload_store)?;
        let make_results = resolve(&self.result_stores, "result store", &names.result_store)?;

        let queue = make_queue(settings)?;
        let payloads = make_payloads(settings)?;
        let results = make_results(settings)?;

        info!(
            work_queue = %names.work_queue,
            payload_store = %names.payload_store,
            result_store = %names.result_store,
            "components built"
        );
        Ok(Components {
            queue,
            payloads,
            results,
        })
    }
}

fn resolve<'a, T: ?Sized>(
    factories: &'a HashMap<String, Factory<T>>,
    kind: &'static str,
    name: &str,
) -> Result<&'a Factory<T>> {
    factories.get(name).ok_or_else(|| Error::UnknownComponent {
        kind,
        name: name.to_string(),
    })
}
