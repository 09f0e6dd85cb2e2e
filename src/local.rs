//! Local Hybrid Tier
//!
//! In-process key -> entry map consulted before any remote replica. Mutating
//! operations serialize behind a `parking_lot::RwLock`; reads share the lock.
//! Expiry is detected lazily on read. When the byte budget is exceeded the
//! tier evicts a batch of victims chosen by the configured
//! [`EvictionStrategy`] so the amortized cost stays low.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::entry::CacheEntry;
use crate::policy::EvictionStrategy;

/// Local in-memory tier with a byte budget
#[derive(Debug)]
pub struct LocalTier {
    /// Key -> entry map
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    /// Byte budget for serialized payloads
    max_bytes: u64,
    /// Serialized bytes currently held
    used_bytes: AtomicU64,
    /// Monotonic access/insertion sequence for recency ordering
    seq: AtomicU64,
    /// Victim-selection strategy
    strategy: EvictionStrategy,
    /// Entries evicted under capacity pressure
    evictions: AtomicU64,
}

impl LocalTier {
    /// Create a tier with a byte budget and eviction strategy
    pub fn new(max_bytes: u64, strategy: EvictionStrategy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_bytes,
            used_bytes: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            strategy,
            evictions: AtomicU64::new(0),
        }
    }

    #[inline]
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get a live entry. Expired entries are dropped here and reported as
    /// absent; hits get their access stats refreshed.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let entry = self.entries.read().get(key).cloned()?;

        if entry.is_expired() {
            self.remove(key);
            return None;
        }

        entry.touch_with_seq(self.next_seq());
        Some(entry)
    }

    /// Peek at an entry without refreshing its access stats
    pub fn peek(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.entries.read().get(key).cloned()
    }

    /// Insert an entry, replacing any previous value for the key. Triggers a
    /// batched eviction when the byte budget is exceeded afterwards.
    pub fn insert(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        entry.set_created_seq(self.next_seq());
        let entry = Arc::new(entry);
        let size = entry.size_bytes;

        {
            let mut guard = self.entries.write();
            if let Some(old) = guard.insert(entry.key.clone(), entry.clone()) {
                self.used_bytes.fetch_sub(old.size_bytes, Ordering::Relaxed);
            }
            self.used_bytes.fetch_add(size, Ordering::Relaxed);

            if self.used_bytes.load(Ordering::Relaxed) > self.max_bytes {
                self.evict_batch(&mut guard, &entry.key);
            }
        }

        entry
    }

    /// Remove an entry by key
    pub fn remove(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let removed = self.entries.write().remove(key)?;
        self.used_bytes
            .fetch_sub(removed.size_bytes, Ordering::Relaxed);
        Some(removed)
    }

    /// Whether a key is present (expired entries still count until read)
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Snapshot of all keys, for pattern-based invalidation
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Snapshot of all live entries, for redistribution after node removal
    pub fn entries_snapshot(&self) -> Vec<Arc<CacheEntry>> {
        self.entries.read().values().cloned().collect()
    }

    /// Evict a batch of victims: always expired entries first, then the
    /// lowest-scoring live entries, ceil(10%) of the entry count per trigger.
    /// The entry whose insert triggered the batch is never a victim.
    fn evict_batch(&self, guard: &mut HashMap<String, Arc<CacheEntry>>, protect: &str) {
        let batch = self.strategy.batch_size(guard.len());
        if batch == 0 {
            return;
        }

        let mut candidates: Vec<(String, f64, u64)> = guard
            .values()
            .filter(|e| e.key != protect)
            .map(|e| {
                let score = if e.is_expired() {
                    f64::MIN
                } else {
                    self.strategy.victim_score(e)
                };
                (e.key.clone(), score, e.size_bytes)
            })
            .collect();

        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut evicted = 0usize;
        for (key, _, size) in candidates.into_iter().take(batch) {
            if guard.remove(&key).is_some() {
                self.used_bytes.fetch_sub(size, Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(
                evicted,
                strategy = %self.strategy,
                used_bytes = self.used_bytes.load(Ordering::Relaxed),
                "local tier eviction batch"
            );
        }
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the tier is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Serialized bytes currently held
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes.load(Ordering::Relaxed)
    }

    /// Byte budget
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Entries evicted under capacity pressure
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Drop everything
    pub fn clear(&self) {
        self.entries.write().clear();
        self.used_bytes.store(0, Ordering::Relaxed);
    }
}

// =============================================================================
// Tests
// =============================================================================
