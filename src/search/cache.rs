/// Search result cache with TTL, modification-based invalidation and
/// bounded size
///
/// Keyed by a fingerprint of the full query. Entries expire after the
/// configured TTL and are purged lazily on lookup; in smart mode an entry is
/// also dropped when the search scope has been modified since it was stored.
/// At capacity the single oldest entry by creation time is evicted — creation
/// order, not LRU: hit counts are bookkeeping only.
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use sha2::{Digest, Sha256};

use super::{SearchQuery, SearchResult};
use crate::config::CacheConfig;

/// Deterministic fingerprint of a query and its options
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn fingerprint(query: &SearchQuery) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(query.text.as_bytes());
        hasher.update([0]);
        hasher.update(query.scope_path.display().to_string().as_bytes());
        hasher.update([0]);
        hasher.update(query.context_lines.to_le_bytes());
        hasher.update(query.max_results.to_le_bytes());
        hasher.update([query.fuzzy as u8, query.recursive as u8]);
        Self(format!("{:x}", hasher.finalize()))
    }
}

struct CacheEntry {
    result: SearchResult,
    created_at: Instant,
    source_mtime: Option<SystemTime>,
    hits: u64,
}

struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    total_hits: u64,
}

/// Cache statistics for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub max_size: usize,
    pub total_hits: u64,
}

/// Content-addressed cache in front of the search pipeline
pub struct SearchCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    max_entries: usize,
    smart: bool,
}

impl SearchCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                total_hits: 0,
            }),
            ttl: Duration::from_secs(config.ttl_seconds),
            max_entries: config.max_entries,
            smart: config.smart,
        }
    }

    /// Look up a fresh entry. `scope_mtime` is the current modification time
    /// of the search scope, used for smart invalidation.
    pub fn get(&self, key: &CacheKey, scope_mtime: Option<SystemTime>) -> Option<SearchResult> {
        self.get_at(key, scope_mtime, Instant::now())
    }

    pub fn insert(&self, key: CacheKey, result: SearchResult, source_mtime: Option<SystemTime>) {
        self.insert_at(key, result, source_mtime, Instant::now())
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        CacheStats {
            entries: inner.entries.len(),
            max_size: self.max_entries,
            total_hits: inner.total_hits,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.clear();
    }

    pub(crate) fn get_at(
        &self,
        key: &CacheKey,
        scope_mtime: Option<SystemTime>,
        now: Instant,
    ) -> Option<SearchResult> {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) => {
                if now.duration_since(entry.created_at) > self.ttl {
                    true
                } else if self.smart {
                    // Scope changed since the entry was stored: stale.
                    match (scope_mtime, entry.source_mtime) {
                        (Some(current), Some(stored)) => current > stored,
                        _ => false,
                    }
                } else {
                    false
                }
            }
        };

        if expired {
            inner.entries.remove(key);
            return None;
        }

        inner.total_hits += 1;
        let entry = inner.entries.get_mut(key).expect("entry checked above");
        entry.hits += 1;
        Some(entry.result.clone())
    }

    pub(crate) fn insert_at(
        &self,
        key: CacheKey,
        result: SearchResult,
        source_mtime: Option<SystemTime>,
        now: Instant,
    ) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            // Evict the single oldest entry by creation time.
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest);
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                result,
                created_at: now,
                source_mtime,
                hits: 0,
            },
        );
    }
}
