//! Durable JSON key/value store.
//!
//! # Responsibilities
//! - Persist JSON documents under logical slash-delimited paths
//! - Stamp every write with a timestamp for TTL-gated reads
//! - Never leave a partially written entry behind (temp file + rename)
//!
//! Shared contract used by the query cache, the transaction history log,
//! and the keyring. Paths are process-wide; writes are idempotent
//! overwrites, so concurrent writers need no coordination.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document plus its write timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stamped {
    value: Value,
    timestamp: u64,
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current unix time in milliseconds.
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// File-backed JSON store rooted at one directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at `root`. The directory is created lazily
    /// on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &str) -> PathBuf {
        self.root.join(format!("{path}.json"))
    }

    /// Write `value` at `path`, stamping it with the current time.
    /// Unconditional overwrite of any prior entry.
    pub fn put(&self, path: &str, value: &Value) -> StoreResult<()> {
        self.put_at(path, value, unix_now())
    }

    /// Write with an explicit timestamp. Exposed for TTL tests.
    pub fn put_at(&self, path: &str, value: &Value, timestamp: u64) -> StoreResult<()> {
        let file_path = self.file_path(path);
        let parent = file_path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        // Every write gets its own temp file, renamed into place, so
        // concurrent writers to one path cannot tear each other's entry
        // and readers see the old entry or a whole new one.
        let stamped = Stamped {
            value: value.clone(),
            timestamp,
        };
        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, &stamped)?;
        writer.flush()?;
        drop(writer);
        tmp.persist(&file_path).map_err(|e| StoreError::Io(e.error))?;

        tracing::trace!(path, "store write");
        Ok(())
    }

    /// Read the value at `path`, ignoring age. `None` when absent.
    pub fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        Ok(self.read_stamped(path)?.map(|s| s.value))
    }

    /// TTL-gated read.
    ///
    /// Returns `None` when `update` is set, the entry is absent, or the
    /// entry is stale (`age >= max_age` when `max_age` is given). A
    /// `max_age` of `None` means entries never expire.
    pub fn get_max_age(
        &self,
        path: &str,
        max_age: Option<u64>,
        update: bool,
    ) -> StoreResult<Option<Value>> {
        if update {
            return Ok(None);
        }
        let Some(stamped) = self.read_stamped(path)? else {
            return Ok(None);
        };
        if let Some(max_age) = max_age {
            let age = unix_now().saturating_sub(stamped.timestamp);
            if age >= max_age {
                tracing::debug!(path, age, max_age, "store entry stale");
                return Ok(None);
            }
        }
        Ok(Some(stamped.value))
    }

    /// Remove the entry at `path`. Returns whether it existed.
    pub fn remove(&self, path: &str) -> StoreResult<bool> {
        let file_path = self.file_path(path);
        match fs::remove_file(&file_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List logical paths under a prefix, sorted. Missing prefix
    /// directories yield an empty list.
    pub fn list_paths(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let dir = self.root.join(prefix);
        let mut paths = Vec::new();
        if dir.is_dir() {
            self.walk(&dir, &mut paths)?;
        }
        paths.sort();
        Ok(paths)
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> StoreResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, out)?;
            } else if path.extension().is_some_and(|ext| ext == "json") {
                if let Ok(rel) = path.strip_prefix(&self.root) {
                    let logical = rel.with_extension("");
                    out.push(logical.to_string_lossy().into_owned());
                }
            }
        }
        Ok(())
    }

    fn read_stamped(&self, path: &str) -> StoreResult<Option<Stamped>> {
        let file_path = self.file_path(path);
        let file = match File::open(&file_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stamped = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(stamped))
    }
}
