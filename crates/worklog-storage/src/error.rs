//! # error
//!
//! why: give every failure of the append log a type the http layer can map to a status
//! relations: returned by store.rs, lock.rs and service.rs
//! what: StoreError, LockError, LogError

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use worklog_core::ValidationError;

/// i/o failure reading or writing the persisted collection
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize log: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// failure to obtain or give back exclusive ownership of a store
#[derive(Debug, Error)]
pub enum LockError {
    /// still held elsewhere after the whole retry budget was spent
    #[error("lock on {key} not acquired after {attempts} attempts")]
    Timeout { key: String, attempts: u32 },
    #[error("lock i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// everything a LogService operation can fail with
#[derive(Debug, Error)]
pub enum LogError {
    /// caller error, detected before any lock or i/o
    #[error("invalid log entry: {0}")]
    Validation(#[from] ValidationError),
    /// transient, safe to retry the whole operation
    #[error("log is busy: {0}")]
    Concurrency(#[from] LockError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// the store has never been created
    #[error("log file not found")]
    NotInitialized,
}
