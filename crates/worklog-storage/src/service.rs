//! # service
//!
//! why: the only place that combines locking and storage, so every mutation follows one discipline
//! relations: uses store.rs for persistence, lock.rs for exclusion, called by worklog-server
//! what: LogService with append, clear, list_all, export_csv

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};
use worklog_core::{csv, LogEntry};

use crate::error::{LogError, StoreError};
use crate::lock::{self, FileLocker, Locker, RetryPolicy};
use crate::store::{FileStore, Loaded, LogStore};

/// append log over a store, with locked mutations and lock-free reads
#[derive(Debug)]
pub struct LogService<S> {
    store: S,
    locker: Arc<dyn Locker>,
    retry: RetryPolicy,
}

impl LogService<FileStore> {
    /// file-backed service guarded by an os advisory lock
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self::new(FileStore::new(path)?, Arc::new(FileLocker)))
    }
}

impl<S: LogStore> LogService<S> {
    pub fn new(store: S, locker: Arc<dyn Locker>) -> Self {
        Self {
            store,
            locker,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// create the store as an empty collection unless it already exists
    pub fn initialize(&self) -> Result<bool, LogError> {
        self.with_lock("initialize", |store| Ok(store.initialize()?))
    }

    /// validate `value` and add it to the end of the log
    ///
    /// a corrupt log is preserved (where the store supports it) and then
    /// replaced by a collection holding just this entry.
    pub fn append(&self, value: Value) -> Result<(), LogError> {
        let entry = LogEntry::from_value(value)?;

        self.with_lock("save", |store| {
            let mut entries = match store.load()? {
                Loaded::Missing => Vec::new(),
                Loaded::Entries(entries) => entries,
                Loaded::Corrupt { reason } => {
                    warn!(key = store.key(), %reason, "log data is corrupt, resetting");
                    if let Err(e) = store.preserve_corrupt() {
                        error!(key = store.key(), error = %e, "could not preserve corrupt log");
                    }
                    Vec::new()
                }
            };

            entries.push(entry);
            store.write_all(&entries)?;
            info!(key = store.key(), count = entries.len(), "log entry saved");
            Ok(())
        })
    }

    /// reset the log to an empty collection
    pub fn clear(&self) -> Result<(), LogError> {
        self.with_lock("clear", |store| {
            store.write_all(&[])?;
            info!(key = store.key(), "log cleared");
            Ok(())
        })
    }

    /// every entry in append order; missing or corrupt data reads as empty
    pub fn list_all(&self) -> Result<Vec<LogEntry>, LogError> {
        Ok(self.store.read_all()?)
    }

    /// the log as csv with the fixed column schema
    ///
    /// unlike `list_all`, a store that was never initialized is an error.
    pub fn export_csv(&self) -> Result<String, LogError> {
        let entries = match self.store.load()? {
            Loaded::Missing => return Err(LogError::NotInitialized),
            Loaded::Entries(entries) => entries,
            Loaded::Corrupt { reason } => {
                warn!(key = self.store.key(), %reason, "log data is corrupt, exporting empty csv");
                Vec::new()
            }
        };
        Ok(csv::render(&entries))
    }

    fn with_lock<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&S) -> Result<T, LogError>,
    ) -> Result<T, LogError> {
        let key = self.store.key();
        let token = lock::acquire(self.locker.as_ref(), key, &self.retry).map_err(|e| {
            error!(key, op, error = %e, "lock not acquired");
            LogError::from(e)
        })?;
        info!(key, op, "lock acquired");

        let result = f(&self.store);

        match token.release() {
            Ok(()) => info!(key, op, "lock released"),
            Err(e) => error!(key, op, error = %e, "error releasing lock"),
        }

        if let Err(e) = &result {
            error!(key, op, error = %e, "log operation failed");
        }
        result
    }
}
