//! Core data model.
//!
//! A work record names a job (key + worker type) and carries a parameter
//! bag. Large inputs live in the payload store and outputs in the result
//! store, both addressed by the record's derived key.

pub mod params;

use serde::{Deserialize, Serialize};

pub use params::ExtraParams;

/// Joins a job key and worker type into the identifier used by the stores.
pub fn derived_key(key: &str, worker_type: &str) -> String {
    format!("{key}-{worker_type}")
}

// ---------------------------------------------------------------------------
// Work Record
// ---------------------------------------------------------------------------

/// A unit of work moving through the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    /// Caller-assigned identifier, unique per logical job.
    pub key: String,

    /// Selects the worker implementation that handles this record.
    pub worker_type: String,

    /// Caller metadata plus engine bookkeeping (`Tried`, `LeaseToken`, ...).
    #[serde(default)]
    pub extra_params: ExtraParams,
}

impl WorkRecord {
    pub fn new(key: impl Into<String>, worker_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            worker_type: worker_type.into(),
            extra_params: ExtraParams::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.set(name, value);
        self
    }

    /// `key-worker_type`, the address of this record's payload and result.
    pub fn derived_key(&self) -> String {
        derived_key(&self.key, &self.worker_type)
    }

    /// True when the record was scheduled without a payload.
    pub fn has_no_data(&self) -> bool {
        self.extra_params.is_true(params::NO_DATA)
    }

    /// Failed attempts so far. Unparseable values count as zero.
    pub fn tried(&self) -> u32 {
        self.extra_params
            .get(params::TRIED)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn set_tried(&mut self, tried: u32) {
        self.extra_params.set(params::TRIED, tried.to_string());
    }

    pub fn message_id(&self) -> Option<&str> {
        self.extra_params.get(params::MESSAGE_ID)
    }

    pub fn lease_token(&self) -> Option<&str> {
        self.extra_params.get(params::LEASE_TOKEN)
    }
}

// ---------------------------------------------------------------------------
// Payload Record
// ---------------------------------------------------------------------------

/// Raw input for a work record, stored under its derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub key: String,
    pub data: Vec<u8>,
}

impl PayloadRecord {
    pub fn new(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result Record
// ---------------------------------------------------------------------------

/// Output of a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Set by the engine to the work record's derived key before storing.
    pub key: String,

    pub data: Vec<u8>,

    /// Not finished; put the item back and try again later without
    /// counting it as a failure.
    #[serde(default)]
    pub postpone: bool,

    #[serde(default)]
    pub extra_params: ExtraParams,
}

impl ResultRecord {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// A result asking for the item to be released and retried later.
    pub fn postponed() -> Self {
        Self {
            postpone: true,
            ..Default::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.set(name, value);
        self
    }
}
