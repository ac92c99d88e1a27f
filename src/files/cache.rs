//! Shared cache of small file contents.
//!
//! Entries are keyed by canonical path and validated against the file's
//! current modification time and size on every lookup, so a changed file is
//! never served from a stale entry. Lookups share a read lock; inserts and
//! evictions take the write lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use bytes::Bytes;
use parking_lot::RwLock;

#[derive(Debug, Clone)]
pub struct FileCacheEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
    pub content: Bytes,
    pub content_type: &'static str,
    inserted_at: Instant,
}

impl FileCacheEntry {
    pub fn new(path: PathBuf, modified: SystemTime, content: Bytes, content_type: &'static str) -> Self {
        Self {
            path,
            modified,
            size: content.len() as u64,
            content,
            content_type,
            inserted_at: Instant::now(),
        }
    }

    fn is_fresh(&self, modified: SystemTime, size: u64) -> bool {
        self.modified == modified && self.size == size
    }
}

#[derive(Debug)]
pub struct FileCache {
    entries: RwLock<HashMap<PathBuf, Arc<FileCacheEntry>>>,
    max_entries: usize,
    max_file_size: u64,
}

impl FileCache {
    pub fn new(max_entries: usize, max_file_size: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            max_file_size,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.max_entries > 0
    }

    /// Whether a file of `size` bytes may be cached.
    pub fn accepts(&self, size: u64) -> bool {
        self.is_enabled() && size <= self.max_file_size
    }

    /// Returns the entry for `path` if it still matches the file on disk.
    pub fn get(&self, path: &Path, modified: SystemTime, size: u64) -> Option<Arc<FileCacheEntry>> {
        let entries = self.entries.read();
        entries
            .get(path)
            .filter(|entry| entry.is_fresh(modified, size))
            .cloned()
    }

    /// Publishes an entry, evicting the oldest one if the cache is full.
    pub fn insert(&self, entry: FileCacheEntry) -> Arc<FileCacheEntry> {
        let entry = Arc::new(entry);
        if !self.accepts(entry.size) {
            return entry;
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(&entry.path) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(path, _)| path.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                tracing::trace!(path = %oldest.display(), "evicted file cache entry");
            }
        }
        entries.insert(entry.path.clone(), Arc::clone(&entry));
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
