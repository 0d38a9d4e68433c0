//! Insertion-ordered term cache with fractional FIFO eviction

use crate::types::CacheStats;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default maximum number of cached terms
pub const DEFAULT_CAPACITY: usize = 200;

/// Fraction of capacity removed when the cache fills up
const EVICTION_FRACTION: f64 = 0.3;

/// Normalize a search term for use as a cache key
///
/// Idempotent: normalizing an already-normalized term is a no-op.
pub fn normalize(term: &str) -> String {
    term.trim().to_lowercase()
}

struct CacheState {
    entries: HashMap<String, PathBuf>,
    /// Keys in insertion order, oldest first
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

/// Bounded map from normalized search term to stored image path
///
/// Interior mutability via an async mutex so the cache can be shared
/// behind an `Arc` across concurrent requests.
pub struct TermImageCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl TermImageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up the stored path for a normalized term
    ///
    /// Performs no disk I/O; the caller is responsible for checking that
    /// the path still reads and calling [`invalidate`](Self::invalidate)
    /// when it does not.
    pub async fn lookup(&self, key: &str) -> Option<PathBuf> {
        let mut state = self.state.lock().await;
        match state.entries.get(key).cloned() {
            Some(path) => {
                state.hits += 1;
                Some(path)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Insert or overwrite a term-to-path mapping
    ///
    /// An overwritten key moves to the newest eviction position.
    pub async fn insert(&self, key: &str, path: PathBuf) {
        let mut state = self.state.lock().await;
        if state.entries.insert(key.to_string(), path).is_some() {
            state.order.retain(|k| k != key);
        }
        state.order.push_back(key.to_string());
    }

    /// Evict the oldest entries if the cache is at capacity
    ///
    /// Removes `floor(capacity * 0.3)` entries in insertion order and
    /// returns the number removed (0 when below capacity).
    pub async fn evict_if_full(&self) -> usize {
        let mut state = self.state.lock().await;
        if state.entries.len() < self.capacity {
            return 0;
        }

        let to_remove = (self.capacity as f64 * EVICTION_FRACTION) as usize;
        for _ in 0..to_remove {
            if let Some(key) = state.order.pop_front() {
                state.entries.remove(&key);
            }
        }

        info!(removed = to_remove, "Cleaned cached image entries");
        to_remove
    }

    /// Drop a single entry, e.g. when its backing file no longer reads
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.entries.remove(key).is_some() {
            state.order.retain(|k| k != key);
            debug!(key, "Invalidated cache entry");
            true
        } else {
            false
        }
    }

    /// Remove every entry and attempt to delete each stored file
    ///
    /// File deletion failures are logged and skipped; the in-memory state
    /// is always fully cleared. Returns the entry count before clearing.
    pub async fn clear(&self) -> usize {
        let paths: Vec<PathBuf> = {
            let mut state = self.state.lock().await;
            state.order.clear();
            state.entries.drain().map(|(_, path)| path).collect()
        };

        let count = paths.len();
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete cached file");
            }
        }

        info!(entries = count, "Cache cleared");
        count
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Whether a key is currently cached, without touching hit counters
    pub async fn contains(&self, key: &str) -> bool {
        self.state.lock().await.entries.contains_key(key)
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            capacity: self.capacity,
            hits: state.hits,
            misses: state.misses,
        }
    }
}
