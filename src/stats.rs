//! Cache Statistics and Health Reporting
//!
//! Aggregate counters owned by the manager and updated on every operation,
//! plus the health report consumed by external monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Aggregate operation counters
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    remote_hits: AtomicU64,
    remote_errors: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    invalidations: AtomicU64,
    /// Running average response time in microseconds (EMA)
    response_time_us: AtomicU64,
}

impl CacheStats {
    /// Create a zeroed counter set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_error(&self) {
        self.remote_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    /// Fold an observed operation latency into the running average
    pub fn record_response_time(&self, duration: Duration) {
        let new_us = duration.as_micros() as u64;
        let alpha = 0.1; // EMA smoothing factor

        loop {
            let current = self.response_time_us.load(Ordering::Relaxed);
            let updated = if current == 0 {
                new_us
            } else {
                ((1.0 - alpha) * current as f64 + alpha * new_us as f64) as u64
            };

            if self
                .response_time_us
                .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate across all tiers (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = (self.hits() + self.remote_hits.load(Ordering::Relaxed)) as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Running average response time
    pub fn avg_response_time(&self) -> Duration {
        Duration::from_micros(self.response_time_us.load(Ordering::Relaxed))
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self, evictions: u64, used_bytes: u64, max_bytes: u64) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions,
            used_bytes,
            max_bytes,
            hit_rate: self.hit_rate(),
            avg_response_time_ms: self.avg_response_time().as_secs_f64() * 1000.0,
        }
    }

    /// Zero all counters
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.remote_hits.store(0, Ordering::Relaxed);
        self.remote_errors.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
        self.response_time_us.store(0, Ordering::Relaxed);
    }
}

/// Serializable snapshot of the aggregate counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub remote_hits: u64,
    pub remote_errors: u64,
    pub sets: u64,
    pub deletes: u64,
    pub invalidations: u64,
    pub evictions: u64,
    pub used_bytes: u64,
    pub max_bytes: u64,
    pub hit_rate: f64,
    pub avg_response_time_ms: f64,
}

/// Health summary consumed by external monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Hit rate across all tiers, percent
    pub hit_rate_percent: f64,
    /// Local tier memory utilization, percent
    pub memory_utilization_percent: f64,
    /// Nodes currently routable
    pub active_nodes: usize,
    /// Nodes registered
    pub total_nodes: usize,
    /// Running average response time in milliseconds
    pub avg_response_time_ms: f64,
    /// Keys populated by cache warming
    pub warmed_keys: usize,
}

// =============================================================================
// Tests
// =============================================================================
