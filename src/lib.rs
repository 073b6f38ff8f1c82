//! # batchq
//!
//! Distributed batch processing over a lease-based work queue.
//!
//! Producers lease work items per worker type, consumers run the matching
//! worker and store its result, and a rebalancer grows or shrinks the
//! consumer pool from rolling CPU and memory averages. Queue and stores are
//! pluggable ports with in-memory and filesystem implementations, selected
//! through the component registry.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod monitor;
pub mod queue;
pub mod registry;
pub mod store;
pub mod telemetry;
pub mod worker;
