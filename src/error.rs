//! Error types for batchq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("engine cannot start without a {0}")]
    MissingComponent(&'static str),

    #[error("no {kind} component registered under name {name:?}")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
