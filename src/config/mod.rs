//! Typed configuration.
//!
//! [`EngineConfig`] holds the engine's tuning knobs. [`Config`] is the host
//! process configuration, loaded once from environment variables; malformed
//! values fail fast.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Minimum time between two pool rebalances.
pub const REBALANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Linux nodes default to one consumer and a pool that never grows.
const PINNED_PLATFORM: bool = cfg!(target_os = "linux");

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Failed attempts allowed before an item is abandoned.
    pub retry_count: u32,
    /// Initial consumer pool size.
    pub concurrent_processes: usize,
    /// Target CPU utilisation (percent) for the rebalancer.
    pub cpu_threshold: f64,
    /// Target memory utilisation (percent) for the rebalancer.
    pub memory_threshold: f64,
    /// Whether the rebalancer may grow the pool on this platform.
    pub allow_scale_up: bool,
    pub rebalance_interval: Duration,
    /// Producer back-off after an empty lease.
    pub idle_poll: Duration,
    /// Notification buffer per subscriber.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            concurrent_processes: default_concurrency(),
            cpu_threshold: 75.0,
            memory_threshold: 80.0,
            allow_scale_up: !PINNED_PLATFORM,
            rebalance_interval: REBALANCE_INTERVAL,
            idle_poll: Duration::from_millis(50),
            event_capacity: 1024,
        }
    }
}

fn default_concurrency() -> usize {
    if PINNED_PLATFORM {
        return 1;
    }
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

#[derive(Debug)]
pub struct Config {
    pub engine: EngineConfig,
    /// Component selection file (TOML). `None` means in-memory defaults.
    pub components: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let mut engine = EngineConfig::default();
        if let Some(n) = parsed_var("BATCHQ_RETRY_COUNT")? {
            engine.retry_count = n;
        }
        if let Some(n) = parsed_var::<usize>("BATCHQ_CONCURRENT_PROCESSES")? {
            if n == 0 {
                return Err(Error::Config(
                    "BATCHQ_CONCURRENT_PROCESSES must be at least 1".to_string(),
                ));
            }
            engine.concurrent_processes = n;
        }
        if let Some(t) = parsed_var("BATCHQ_CPU_THRESHOLD")? {
            engine.cpu_threshold = percentage("BATCHQ_CPU_THRESHOLD", t)?;
        }
        if let Some(t) = parsed_var("BATCHQ_MEMORY_THRESHOLD")? {
            engine.memory_threshold = percentage("BATCHQ_MEMORY_THRESHOLD", t)?;
        }
        if let Some(b) = parsed_var("BATCHQ_SCALE_UP")? {
            engine.allow_scale_up = b;
        }

        Ok(Self {
            engine,
            components: std::env::var("BATCHQ_COMPONENTS").ok().map(PathBuf::from),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value {raw:?} for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn percentage(name: &str, value: f64) -> Result<f64> {
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::Config(format!(
            "{name} must be within 0-100, got {value}"
        )))
    }
}
