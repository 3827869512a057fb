//! engine::cache
//!
//! Incremental verification cache keyed by content hash.
//!
//! # Architecture
//!
//! [`HashCache`] is the in-memory working set, split into shards of
//! `parking_lot::RwLock<HashMap>` selected by key hash so parallel phase
//! workers rarely contend. It sits in front of a [`CacheStore`]: entries are
//! pulled from the store on first access and dirty entries are written back
//! by [`HashCache::persist`].
//!
//! Keys are document paths relative to the corpus root, with `/`
//! separators.
//!
//! # Invariants
//!
//! - An entry only vouches for the hash it was recorded with; observing a
//!   different hash drops it
//! - A phase is marked verified only after a clean result
//! - A store that cannot be decoded, has another version, or was written
//!   under another configuration fingerprint is treated as empty
//!
//! # Example
//!
//! ```
//! use corpuscheck::core::types::ContentHash;
//! use corpuscheck::engine::cache::{HashCache, MemoryStore};
//! use corpuscheck::engine::phases::PhaseCode;
//!
//! let cache = HashCache::new(Box::new(MemoryStore::default()));
//! let hash = ContentHash::of_body("body");
//!
//! assert!(!cache.is_verified("1.md", &hash, PhaseCode::V09));
//! cache.mark_verified("1.md", &hash, PhaseCode::V09);
//! assert!(cache.is_verified("1.md", &hash, PhaseCode::V09));
//!
//! cache.observe("1.md", &ContentHash::of_body("edited"));
//! assert!(!cache.is_verified("1.md", &hash, PhaseCode::V09));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::ops::write_atomic;
use crate::core::types::{ContentHash, Fingerprint};
use crate::engine::phases::PhaseCode;

/// On-disk format version.
pub const CACHE_VERSION: u32 = 1;

const SHARDS: usize = 16;

/// Errors from cache persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot write cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What the cache knows about one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: ContentHash,
    /// Phases that passed for `hash`.
    pub verified: BTreeSet<PhaseCode>,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(hash: ContentHash) -> Self {
        Self {
            hash,
            verified: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Backing storage for cache entries.
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn put(&self, key: &str, entry: CacheEntry);
    fn delete(&self, key: &str);
    /// Make every `put` and `delete` durable.
    fn flush(&self) -> Result<(), CacheError>;
}

/// A store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    fingerprint: String,
    entries: BTreeMap<String, CacheEntry>,
}

/// A single JSON document on disk, loaded once at open.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    fingerprint: Fingerprint,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl JsonFileStore {
    /// Open the store at `path`.
    ///
    /// Never fails: a missing file is an empty store, and an unreadable or
    /// inconsistent file is logged and treated as empty.
    pub fn open(path: &Path, fingerprint: Fingerprint) -> Self {
        let entries = Self::read(path, &fingerprint).unwrap_or_default();
        debug!(path = %path.display(), entries = entries.len(), "cache opened");
        Self {
            path: path.to_path_buf(),
            fingerprint,
            entries: Mutex::new(entries),
        }
    }

    fn read(path: &Path, fingerprint: &Fingerprint) -> Option<BTreeMap<String, CacheEntry>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache unreadable, starting empty");
                return None;
            }
        };

        let file: CacheFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache corrupt, starting empty");
                return None;
            }
        };

        if file.version != CACHE_VERSION {
            warn!(
                path = %path.display(),
                found = file.version,
                expected = CACHE_VERSION,
                "cache version mismatch, starting empty"
            );
            return None;
        }
        if file.fingerprint != fingerprint.as_str() {
            debug!(path = %path.display(), "configuration changed, cache reset");
            return None;
        }
        Some(file.entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn flush(&self) -> Result<(), CacheError> {
        let file = CacheFile {
            version: CACHE_VERSION,
            fingerprint: self.fingerprint.to_string(),
            entries: self.entries.lock().clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path, content.as_bytes()).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// A shard slot: `None` marks an entry dropped since load.
type Slot = Option<CacheEntry>;

/// The sharded hash cache.
#[derive(Debug)]
pub struct HashCache {
    shards: Vec<RwLock<HashMap<String, Slot>>>,
    dirty: Mutex<BTreeSet<String>>,
    store: Box<dyn CacheStore>,
}

impl HashCache {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self {
            shards: (0..SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            dirty: Mutex::new(BTreeSet::new()),
            store,
        }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, Slot>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARDS]
    }

    fn entry(&self, key: &str) -> Slot {
        if let Some(slot) = self.shard(key).read().get(key) {
            return slot.clone();
        }
        let loaded = self.store.get(key);
        self.shard(key)
            .write()
            .entry(key.to_string())
            .or_insert(loaded)
            .clone()
    }

    fn set(&self, key: &str, slot: Slot) {
        self.shard(key).write().insert(key.to_string(), slot);
        self.dirty.lock().insert(key.to_string());
    }

    /// Current entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entry(key)
    }

    /// Record the current hash of `key`, dropping a stale entry.
    pub fn observe(&self, key: &str, hash: &ContentHash) {
        if let Some(entry) = self.entry(key) {
            if &entry.hash != hash {
                debug!(key, "content changed, cache entry dropped");
                self.set(key, None);
            }
        }
    }

    pub fn is_verified(&self, key: &str, hash: &ContentHash, code: PhaseCode) -> bool {
        self.entry(key)
            .map(|entry| &entry.hash == hash && entry.verified.contains(&code))
            .unwrap_or(false)
    }

    /// Record a clean result of `code` for `hash`.
    pub fn mark_verified(&self, key: &str, hash: &ContentHash, code: PhaseCode) {
        let mut entry = match self.entry(key) {
            Some(entry) if &entry.hash == hash => entry,
            _ => CacheEntry::new(hash.clone()),
        };
        entry.verified.insert(code);
        entry.updated_at = Utc::now();
        self.set(key, Some(entry));
    }

    pub fn invalidate(&self, key: &str) {
        self.set(key, None);
    }

    /// Number of entries changed since the last persist.
    pub fn dirty_count(&self) -> usize {
        self.dirty.lock().len()
    }

    /// Write dirty entries through the store and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the store cannot be written.
    pub fn persist(&self) -> Result<(), CacheError> {
        let dirty = std::mem::take(&mut *self.dirty.lock());
        for key in &dirty {
            let slot = self.shard(key).read().get(key).cloned().flatten();
            match slot {
                Some(entry) => self.store.put(key, entry),
                None => self.store.delete(key),
            }
        }
        self.store.flush()?;
        debug!(written = dirty.len(), "cache persisted");
        Ok(())
    }
}
