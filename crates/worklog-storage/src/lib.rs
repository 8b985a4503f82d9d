//! # worklog-storage
//!
//! why: provide a durable append log that survives concurrent writers and a corrupt file
//! relations: built on worklog-core types, driven by worklog-server request handlers
//! what: LogStore trait and implementations, advisory locking, LogService, error taxonomy

pub mod error;
pub mod lock;
pub mod service;
pub mod store;

pub use error::{LockError, LogError, StoreError};
pub use lock::{acquire, FileLocker, LockToken, Locker, ProcessLocker, RetryPolicy};
pub use service::LogService;
pub use store::{FileStore, InMemoryStore, Loaded, LogStore};
