//! # store
//!
//! why: persist the whole log collection as one json document that is never seen half-written
//! relations: driven by service.rs, keyed for locking by lock.rs
//! what: LogStore trait, FileStore implementation, InMemoryStore for testing

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};
use worklog_core::LogEntry;

use crate::error::StoreError;

/// what a store found when it looked at its persisted bytes
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// the store has never been initialized
    Missing,
    Entries(Vec<LogEntry>),
    /// bytes exist but are not a json array
    Corrupt { reason: String },
}

/// trait for durable storage of the log collection
///
/// implementations own their on-disk (or in-memory) representation; callers
/// never cache a copy across operations. all methods take `&self` so one
/// store can be shared by every request handler.
pub trait LogStore: Send + Sync {
    /// identity of the persisted resource, used as the lock key
    fn key(&self) -> &str;

    /// create the resource as an empty collection if it does not exist yet
    ///
    /// returns whether anything was created. safe to call on every start.
    fn initialize(&self) -> Result<bool, StoreError>;

    /// read and parse the current contents
    fn load(&self) -> Result<Loaded, StoreError>;

    /// replace the contents entirely, all or nothing
    fn write_all(&self, entries: &[LogEntry]) -> Result<(), StoreError>;

    /// keep a copy of corrupt contents before they get overwritten
    fn preserve_corrupt(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// tolerant read: missing or corrupt contents read as an empty collection
    fn read_all(&self) -> Result<Vec<LogEntry>, StoreError> {
        match self.load()? {
            Loaded::Missing => Ok(Vec::new()),
            Loaded::Entries(entries) => Ok(entries),
            Loaded::Corrupt { reason } => {
                warn!(key = self.key(), %reason, "log data is corrupt, reading as empty");
                Ok(Vec::new())
            }
        }
    }
}

/// parse persisted bytes; anything but an array is corrupt
///
/// array elements that are not objects can't be log entries. they are
/// skipped so the objects around them survive the next append.
fn parse_collection(bytes: &[u8]) -> Loaded {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => return Loaded::Corrupt { reason: e.to_string() },
    };

    let serde_json::Value::Array(items) = value else {
        return Loaded::Corrupt {
            reason: "log content is not an array".to_string(),
        };
    };

    let total = items.len();
    let entries: Vec<LogEntry> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    let skipped = total - entries.len();
    if skipped > 0 {
        warn!(skipped, kept = entries.len(), "skipping log items that are not objects");
    }
    Loaded::Entries(entries)
}

fn to_json(entries: &[LogEntry]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(entries)?)
}

// -- file storage implementation --

/// a log persisted as one pretty-printed json file
///
/// the collection lives in a single json file. writes go to a sibling
/// `<name>.tmp`, are synced, then renamed over the log file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    key: String,
}

impl FileStore {
    /// create a new filestore for the given log file
    /// creates the parent directory if it doesn't exist
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let key = path.display().to_string();
        Ok(Self { path, key })
    }

    /// path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// path of the scratch file used for atomic replacement
    pub fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn replace_with(&self, json: &str) -> io::Result<()> {
        let temp_path = self.temp_path();
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;

        // make the rename itself durable
        #[cfg(unix)]
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            File::open(dir)?.sync_all()?;
        }

        Ok(())
    }
}

impl LogStore for FileStore {
    fn key(&self) -> &str {
        &self.key
    }

    fn initialize(&self) -> Result<bool, StoreError> {
        let exists = self
            .path
            .try_exists()
            .map_err(|e| StoreError::io(&self.path, e))?;
        if exists {
            return Ok(false);
        }

        self.write_all(&[])?;
        info!(path = %self.path.display(), "log file created");
        Ok(true)
    }

    fn load(&self) -> Result<Loaded, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(parse_collection(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Loaded::Missing),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn write_all(&self, entries: &[LogEntry]) -> Result<(), StoreError> {
        let json = to_json(entries)?;

        if let Err(e) = self.replace_with(&json) {
            let _ = fs::remove_file(self.temp_path());
            return Err(StoreError::io(&self.path, e));
        }

        Ok(())
    }

    /// copy the log file to `<name>.corrupt-<unix millis>`
    ///
    /// empty files carry nothing worth keeping and are skipped.
    fn preserve_corrupt(&self) -> Result<(), StoreError> {
        let len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        if len == 0 {
            return Ok(());
        }

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let backup = self.sibling(&format!(".corrupt-{}", millis));
        fs::copy(&self.path, &backup).map_err(|e| StoreError::io(&backup, e))?;

        warn!(backup = %backup.display(), "corrupt log file preserved");
        Ok(())
    }
}

// -- in-memory storage implementation --

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// a log that lives only as long as the process
///
/// pairs with `ProcessLocker` when one process owns the log. holds the serialized document rather than parsed entries so corrupt
/// contents can be seeded and the tolerant read path exercised.
#[derive(Debug)]
pub struct InMemoryStore {
    key: String,
    contents: Mutex<Option<String>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        let id = NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            key: format!("memory-{}", id),
            contents: Mutex::new(None),
        }
    }
}

impl InMemoryStore {
    /// create a new, uninitialized in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// create a store whose persisted document is `raw`, valid or not
    pub fn with_contents(raw: impl Into<String>) -> Self {
        let store = Self::default();
        *store.slot() = Some(raw.into());
        store
    }

    /// the current persisted document, if any
    pub fn contents(&self) -> Option<String> {
        self.slot().clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.contents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogStore for InMemoryStore {
    fn key(&self) -> &str {
        &self.key
    }

    fn initialize(&self) -> Result<bool, StoreError> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(to_json(&[])?);
        Ok(true)
    }

    fn load(&self) -> Result<Loaded, StoreError> {
        Ok(match self.slot().as_deref() {
            None => Loaded::Missing,
            Some(raw) => parse_collection(raw.as_bytes()),
        })
    }

    fn write_all(&self, entries: &[LogEntry]) -> Result<(), StoreError> {
        let json = to_json(entries)?;
        *self.slot() = Some(json);
        Ok(())
    }
}
