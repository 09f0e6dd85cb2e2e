//! Cache Node Descriptors
//!
//! A [`CacheNode`] describes one backing store participant: its address,
//! weight, and live health/capacity statistics. Health fields are updated by
//! a background monitor concurrently with foreground traffic, so they are
//! plain atomics that readers sample without locking; momentarily stale
//! values are acceptable by contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

/// Descriptor and live stats for one cluster participant
#[derive(Debug)]
pub struct CacheNode {
    /// Node identifier, unique within the cluster
    pub id: String,
    /// Hostname or address of the backing store
    pub host: String,
    /// Port of the backing store
    pub port: u16,
    /// Relative placement weight
    pub weight: u32,
    /// Liveness flag, flipped by the health monitor
    is_active: AtomicBool,
    /// Configured memory budget in megabytes
    pub max_memory_mb: u64,
    /// Observed memory usage in megabytes
    current_memory_mb: AtomicU64,
    /// Last heartbeat received from this node
    last_heartbeat: RwLock<DateTime<Utc>>,
    /// Observed hit rate, stored as f64 bits
    hit_rate_bits: AtomicU64,
    /// Observed response time in microseconds
    response_time_us: AtomicU64,
}

impl CacheNode {
    /// Create a node descriptor with an explicit id
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            weight: 1,
            is_active: AtomicBool::new(true),
            max_memory_mb: 1024,
            current_memory_mb: AtomicU64::new(0),
            last_heartbeat: RwLock::new(Utc::now()),
            hit_rate_bits: AtomicU64::new(0),
            response_time_us: AtomicU64::new(0),
        }
    }

    /// Create a node descriptor with a generated id
    pub fn with_generated_id(host: impl Into<String>, port: u16) -> Self {
        Self::new(format!("node-{}", Uuid::new_v4()), host, port)
    }

    /// Set the placement weight
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }

    /// Set the memory budget
    pub fn with_max_memory_mb(mut self, max_memory_mb: u64) -> Self {
        self.max_memory_mb = max_memory_mb;
        self
    }

    /// Whether the node is currently routable
    #[inline]
    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }

    /// Flip the liveness flag
    pub fn set_active(&self, active: bool) {
        self.is_active.store(active, Ordering::Relaxed);
    }

    /// Observed memory usage in megabytes
    pub fn current_memory_mb(&self) -> u64 {
        self.current_memory_mb.load(Ordering::Relaxed)
    }

    /// Update observed memory usage
    pub fn set_current_memory_mb(&self, mb: u64) {
        self.current_memory_mb.store(mb, Ordering::Relaxed);
    }

    /// Timestamp of the last heartbeat
    pub fn last_heartbeat(&self) -> DateTime<Utc> {
        *self.last_heartbeat.read()
    }

    /// Record a heartbeat and mark the node active
    pub fn record_heartbeat(&self) {
        *self.last_heartbeat.write() = Utc::now();
        self.set_active(true);
    }

    /// Observed hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        f64::from_bits(self.hit_rate_bits.load(Ordering::Relaxed))
    }

    /// Update observed hit rate
    pub fn set_hit_rate(&self, rate: f64) {
        self.hit_rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    /// Observed response time in milliseconds
    pub fn response_time_ms(&self) -> f64 {
        self.response_time_us.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Update observed response time
    pub fn set_response_time_ms(&self, ms: f64) {
        self.response_time_us
            .store((ms * 1000.0) as u64, Ordering::Relaxed);
    }
}

/// Node membership map shared between the manager and the health monitor
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, Arc<CacheNode>>>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any previous descriptor with the same id
    pub fn add(&self, node: CacheNode) -> Arc<CacheNode> {
        let node = Arc::new(node);
        self.nodes.write().insert(node.id.clone(), node.clone());
        node
    }

    /// Remove a node by id
    pub fn remove(&self, node_id: &str) -> Option<Arc<CacheNode>> {
        self.nodes.write().remove(node_id)
    }

    /// Look up a node by id
    pub fn get(&self, node_id: &str) -> Option<Arc<CacheNode>> {
        self.nodes.read().get(node_id).cloned()
    }

    /// Whether a node with this id is registered and active
    pub fn is_active(&self, node_id: &str) -> bool {
        self.nodes
            .read()
            .get(node_id)
            .map(|n| n.is_active())
            .unwrap_or(false)
    }

    /// Number of registered nodes
    pub fn total_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Number of registered nodes currently active
    pub fn active_count(&self) -> usize {
        self.nodes.read().values().filter(|n| n.is_active()).count()
    }

    /// Snapshot of all registered nodes
    pub fn all(&self) -> Vec<Arc<CacheNode>> {
        self.nodes.read().values().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
