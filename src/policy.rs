//! Eviction Strategies
//!
//! Pluggable victim selection for the local tier. Each strategy reduces an
//! entry to a score; entries with the lowest score are evicted first.

use serde::{Deserialize, Serialize};

use crate::entry::CacheEntry;

/// Victim-selection strategy for local-tier eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    /// Evict the entry with the oldest last access first
    Lru,
    /// Evict the entry with the fewest accesses first
    Lfu,
    /// Evict the oldest entry first
    FifoTtl,
    /// Frequency/age blend: favors keeping young, hot entries
    Adaptive,
}

impl Default for EvictionStrategy {
    fn default() -> Self {
        EvictionStrategy::Lru
    }
}

impl EvictionStrategy {
    /// Score an entry for eviction. Lower score = evicted first.
    pub fn victim_score(&self, entry: &CacheEntry) -> f64 {
        match self {
            // Sequence numbers instead of raw timestamps: second-granularity
            // clocks tie for entries touched within the same second.
            EvictionStrategy::Lru => entry.access_seq() as f64,
            EvictionStrategy::Lfu => entry.access_count() as f64,
            EvictionStrategy::FifoTtl => entry.created_seq() as f64,
            EvictionStrategy::Adaptive => {
                let age_hours = entry.age_hours();
                entry.access_count() as f64 / age_hours.max(1.0) / (1.0 + age_hours)
            }
        }
    }

    /// Number of victims per eviction trigger: 10% of the current entry
    /// count, rounded up, so eviction cost is amortized instead of paid on
    /// every insert.
    pub fn batch_size(&self, entry_count: usize) -> usize {
        if entry_count == 0 {
            0
        } else {
            entry_count.div_ceil(10)
        }
    }
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionStrategy::Lru => write!(f, "LRU"),
            EvictionStrategy::Lfu => write!(f, "LFU"),
            EvictionStrategy::FifoTtl => write!(f, "FIFO/TTL"),
            EvictionStrategy::Adaptive => write!(f, "Adaptive"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn make_entry(key: &str) -> CacheEntry {
        CacheEntry::new(key, Bytes::from_static(b"v"), 0)
    }

    #[test]
    fn test_lfu_prefers_cold_entries() {
        let cold = make_entry("cold");
        let hot = make_entry("hot");
        for _ in 0..10 {
            hot.touch();
        }

        let strategy = EvictionStrategy::Lfu;
        assert!(strategy.victim_score(&cold) < strategy.victim_score(&hot));
    }

    #[test]
    fn test_adaptive_prefers_rarely_accessed() {
        let rarely = make_entry("rarely");
        let often = make_entry("often");
        for _ in 0..100 {
            often.touch();
        }

        let strategy = EvictionStrategy::Adaptive;
        assert!(strategy.victim_score(&rarely) < strategy.victim_score(&often));
    }

    #[test]
    fn test_batch_size_is_ten_percent_rounded_up() {
        let strategy = EvictionStrategy::Lru;
        assert_eq!(strategy.batch_size(0), 0);
        assert_eq!(strategy.batch_size(1), 1);
        assert_eq!(strategy.batch_size(10), 1);
        assert_eq!(strategy.batch_size(11), 2);
        assert_eq!(strategy.batch_size(100), 10);
        assert_eq!(strategy.batch_size(101), 11);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(EvictionStrategy::Lru.to_string(), "LRU");
        assert_eq!(EvictionStrategy::Lfu.to_string(), "LFU");
        assert_eq!(EvictionStrategy::FifoTtl.to_string(), "FIFO/TTL");
        assert_eq!(EvictionStrategy::Adaptive.to_string(), "Adaptive");
    }

    #[test]
    fn test_strategy_serde_roundtrip() {
        let json = serde_json::to_string(&EvictionStrategy::FifoTtl).unwrap();
        assert_eq!(json, "\"fifo_ttl\"");
        let back: EvictionStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EvictionStrategy::FifoTtl);
    }
}
