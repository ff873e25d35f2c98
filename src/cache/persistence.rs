//! Optional persistence of the cache table to a key-value store.
//!
//! The whole table is written as one JSON document under a single key. Writes are
//! debounced by a background task (see [`ResponseCache::with_persistence`](super::ResponseCache::with_persistence)).

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::error::{CacheError, CacheResult};

#[async_trait]
/// String key-value store backing cache persistence.
pub trait PersistentKv: Send + Sync {
    /// Returns the stored value, or `None` if the key was never written.
    async fn get_item(&self, key: &str) -> CacheResult<Option<String>>;
    /// Stores `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: String) -> CacheResult<()>;
    /// Deletes `key`. Deleting a missing key is not an error.
    async fn remove_item(&self, key: &str) -> CacheResult<()>;
}

/// Serialized form of one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    /// The value as JSON, or base64 deflate bytes when `compressed` is set.
    pub data: serde_json::Value,
    #[serde(default)]
    pub compressed: bool,
    pub created_at: i64,
    pub expires_at: i64,
    pub access_count: u64,
    pub last_accessed: i64,
    pub quality: f64,
    pub size: usize,
    pub tags: BTreeSet<String>,
}

pub type PersistedTable = HashMap<String, PersistedEntry>;

/// In-process store. Counts writes so debouncing is observable.
#[derive(Debug, Default)]
pub struct MemoryKv {
    items: Mutex<HashMap<String, String>>,
    writes: AtomicU64,
    failing: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set_item` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Makes every subsequent operation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn check(&self) -> CacheResult<()> {
        if self.failing.load(Ordering::Acquire) {
            return Err(CacheError::Persistence {
                reason: "memory store configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentKv for MemoryKv {
    async fn get_item(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> CacheResult<()> {
        self.check()?;
        self.items.lock().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.items.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> CacheResult<PathBuf> {
        let rel = sanitize_key(key).ok_or_else(|| CacheError::Persistence {
            reason: format!("Invalid storage key (path traversal?): {}", key),
        })?;
        let mut path = self.dir.join(rel);
        path.set_extension("json");
        Ok(path)
    }
}

fn sanitize_key(key: &str) -> Option<PathBuf> {
    if key.is_empty() {
        return None;
    }

    let mut out = PathBuf::new();
    for c in Path::new(key).components() {
        match c {
            Component::Normal(seg) => out.push(seg),
            Component::CurDir => continue,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn io_err(e: std::io::Error) -> CacheError {
    CacheError::Persistence {
        reason: e.to_string(),
    }
}

#[async_trait]
impl PersistentKv for FileKv {
    async fn get_item(&self, key: &str) -> CacheResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> CacheResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        // Write-then-rename so a crash mid-write never leaves a truncated table.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)
    }

    async fn remove_item(&self, key: &str) -> CacheResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}
