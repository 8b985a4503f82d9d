//! # lock
//!
//! why: serialize every read-modify-write of a store across threads and processes
//! relations: used by service.rs around append/clear, keyed by LogStore::key
//! what: Locker trait, FileLocker (os advisory lock), ProcessLocker, RetryPolicy, acquire

use std::collections::HashSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use fs2::FileExt;
use tracing::{debug, error};

use crate::error::LockError;

/// bounded exponential backoff between lock attempts
///
/// one initial attempt is always made; `max_retries` more follow, the n-th
/// retry waiting `base_delay * 2^(n-1)` capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// delay before the given retry (1-based)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// something that can hand out exclusive ownership of a keyed resource
///
/// `try_lock` never waits: `Ok(None)` means the key is held elsewhere.
/// waiting and retrying is `acquire`'s job.
pub trait Locker: Send + Sync + fmt::Debug {
    fn try_lock(&self, key: &str) -> Result<Option<LockToken>, LockError>;
}

enum Held {
    File { file: File, path: PathBuf },
    Process { held: Arc<Mutex<HashSet<String>>> },
}

/// proof of ownership of a key
///
/// `release` gives the key back exactly once; a token dropped without being
/// released (early return, panic) releases itself.
pub struct LockToken {
    key: String,
    held: Option<Held>,
}

impl LockToken {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn release(mut self) -> Result<(), LockError> {
        self.release_held()
    }

    fn release_held(&mut self) -> Result<(), LockError> {
        match self.held.take() {
            None => Ok(()),
            Some(Held::File { file, path }) => {
                FileExt::unlock(&file).map_err(|source| LockError::Io { path, source })
            }
            Some(Held::Process { held }) => {
                held.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&self.key);
                Ok(())
            }
        }
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        if let Err(e) = self.release_held() {
            error!(key = %self.key, error = %e, "failed to release lock");
        }
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockToken")
            .field("key", &self.key)
            .field("held", &self.held.is_some())
            .finish()
    }
}

/// obtain `key` from `locker`, retrying per `policy`
pub fn acquire(locker: &dyn Locker, key: &str, policy: &RetryPolicy) -> Result<LockToken, LockError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        if let Some(token) = locker.try_lock(key)? {
            return Ok(token);
        }

        if attempts > policy.max_retries {
            return Err(LockError::Timeout {
                key: key.to_string(),
                attempts,
            });
        }

        let delay = policy.delay_for_retry(attempts);
        debug!(key, attempts, ?delay, "lock busy, backing off");
        thread::sleep(delay);
    }
}

// -- os advisory lock --

/// advisory lock on a `<key>.lock` file next to the store
///
/// visible to every process sharing the store, and to other threads of this
/// process since each attempt opens its own handle.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLocker;

impl FileLocker {
    pub fn lock_path(key: &str) -> PathBuf {
        PathBuf::from(format!("{}.lock", key))
    }
}

impl Locker for FileLocker {
    fn try_lock(&self, key: &str) -> Result<Option<LockToken>, LockError> {
        let path = Self::lock_path(key);
        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
        {
            Ok(file) => file,
            Err(source) => return Err(LockError::Io { path, source }),
        };

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(LockToken {
                key: key.to_string(),
                held: Some(Held::File { file, path }),
            })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(source) => Err(LockError::Io { path, source }),
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

// -- in-process lock --

/// in-process registry of held keys
///
/// enough when a single process owns the store; clones share the registry.
#[derive(Debug, Default, Clone)]
pub struct ProcessLocker {
    held: Arc<Mutex<HashSet<String>>>,
}

impl ProcessLocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

impl Locker for ProcessLocker {
    fn try_lock(&self, key: &str) -> Result<Option<LockToken>, LockError> {
        let inserted = self
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string());

        Ok(inserted.then(|| LockToken {
            key: key.to_string(),
            held: Some(Held::Process {
                held: Arc::clone(&self.held),
            }),
        }))
    }
}
