//! Distributed Cache Manager
//!
//! Orchestrates the ring, the local tier, and the invalidation indices:
//! routes `get`/`set`/`delete` between the local tier and the ring-selected
//! remote replicas, runs eviction, exposes health/metrics, and drives cache
//! warming.
//!
//! Replication is best-effort "any-one-of-N" by default: a `set` succeeds
//! once at least one location accepted it. There is no distributed
//! transaction across replicas. Callers that need a stronger guarantee opt
//! into [`WritePolicy::Quorum`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, WritePolicy};
use crate::entry::{decode_value, encode_value, CacheEntry};
use crate::error::{Error, Result};
use crate::index::KeyIndex;
use crate::local::LocalTier;
use crate::node::{CacheNode, NodeRegistry};
use crate::ring::ConsistentHashRing;
use crate::stats::{CacheStats, HealthReport, StatsSnapshot};
use crate::transport::{InMemoryTransport, NodeTransport};

/// Loader callback consumed by cache warming. Decouples the engine from any
/// concrete data source: the caller supplies the implementation.
#[async_trait]
pub trait CacheLoader: Send + Sync {
    /// Produce a bounded batch of `(key, serialized value)` pairs for a
    /// warming pattern
    async fn load(&self, pattern: &str) -> Result<Vec<(String, Bytes)>>;
}

/// Per-write options for [`DistributedCacheManager::set_with`]
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// TTL override; `None` uses the configured default
    pub ttl_seconds: Option<i64>,
    /// Tags to register the key under
    pub tags: Vec<String>,
    /// Source-of-truth keys this entry depends on
    pub dependencies: Vec<String>,
}

impl SetOptions {
    /// Start from the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the TTL
    pub fn ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    /// Register the key under these tags
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Register the key as dependent on these keys
    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// Orchestrator for the distributed, multi-level cache
pub struct DistributedCacheManager {
    config: CacheConfig,
    ring: RwLock<ConsistentHashRing>,
    registry: NodeRegistry,
    local: LocalTier,
    tags: KeyIndex,
    deps: KeyIndex,
    stats: CacheStats,
    transport: Arc<dyn NodeTransport>,
    warmed: RwLock<HashSet<String>>,
}

impl DistributedCacheManager {
    /// Create a manager with an injected configuration and transport
    pub fn new(config: CacheConfig, transport: Arc<dyn NodeTransport>) -> Self {
        Self {
            ring: RwLock::new(ConsistentHashRing::with_virtual_nodes(config.virtual_nodes)),
            local: LocalTier::new(config.max_local_bytes, config.eviction),
            registry: NodeRegistry::new(),
            tags: KeyIndex::new(),
            deps: KeyIndex::new(),
            stats: CacheStats::new(),
            transport,
            warmed: RwLock::new(HashSet::new()),
            config,
        }
    }

    /// Create a manager backed by the in-memory transport (for testing and
    /// single-process deployments)
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(config, Arc::new(InMemoryTransport::new()))
    }

    /// The configuration this instance was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // =========================================================================
    // Node membership
    // =========================================================================

    /// Register a node and place it on the ring
    pub fn add_node(&self, node: CacheNode) {
        let node_id = node.id.clone();
        self.registry.add(node);
        self.ring.write().add_node(&node_id);
        info!(node_id = %node_id, "node added to cluster");
    }

    /// Remove a node from the ring and registry, redistributing locally
    /// known entries whose replica set included it. Redistribution is best
    /// effort: surviving replicas and local promotion keep reads alive
    /// regardless.
    pub async fn remove_node(&self, node_id: &str) -> bool {
        let affected: Vec<Arc<CacheEntry>> = {
            let ring = self.ring.read();
            if !ring.contains_node(node_id) {
                return false;
            }
            self.local
                .entries_snapshot()
                .into_iter()
                .filter(|entry| {
                    ring.get_nodes_for_replication(&entry.key, self.config.replication_factor)
                        .iter()
                        .any(|id| id == node_id)
                })
                .collect()
        };

        self.ring.write().remove_node(node_id);
        self.registry.remove(node_id);
        info!(node_id = %node_id, affected = affected.len(), "node removed, redistributing");

        for entry in affected {
            let replicas = self.active_replicas(&entry.key);
            if !replicas.is_empty() {
                self.replicate(entry.as_ref().clone(), &replicas).await;
            }
        }

        true
    }

    /// Refresh a node's heartbeat, marking it active again
    pub fn record_heartbeat(&self, node_id: &str) -> Result<()> {
        let node = self
            .registry
            .get(node_id)
            .ok_or_else(|| Error::UnknownNode(node_id.to_string()))?;
        node.record_heartbeat();
        Ok(())
    }

    /// Flip a node's liveness flag without removing it from the ring
    pub fn set_node_active(&self, node_id: &str, active: bool) -> Result<()> {
        let node = self
            .registry
            .get(node_id)
            .ok_or_else(|| Error::UnknownNode(node_id.to_string()))?;
        node.set_active(active);
        Ok(())
    }

    /// Replica node ids for a key, skipping inactive nodes
    fn active_replicas(&self, key: &str) -> Vec<String> {
        if !self.config.enable_distributed {
            return Vec::new();
        }
        self.ring
            .read()
            .replicas_filtered(key, self.config.replication_factor, |id| {
                self.registry.is_active(id)
            })
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Look a key up: local tier first, then the replica set in ring order.
    /// A remote hit is promoted into the local tier with a short TTL. A full
    /// miss is `None`, never an error; unreachable nodes are skipped.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let started = Instant::now();

        if self.config.enable_local {
            if let Some(entry) = self.local.get(key) {
                self.stats.record_hit();
                self.stats.record_response_time(started.elapsed());
                return Some(entry.value.clone());
            }
        }

        for node_id in self.active_replicas(key) {
            let Some(node) = self.registry.get(&node_id) else {
                continue;
            };

            match timeout(self.config.node_timeout, self.transport.remote_get(&node, key)).await {
                Ok(Ok(Some(value))) => {
                    self.stats.record_remote_hit();
                    self.promote(key, &value, &node_id);
                    self.stats.record_response_time(started.elapsed());
                    return Some(value);
                }
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    self.stats.record_remote_error();
                    warn!(node_id = %node_id, key, error = %err, "replica read failed, skipping node");
                }
                Err(_) => {
                    self.stats.record_remote_error();
                    warn!(
                        node_id = %node_id,
                        key,
                        timeout_ms = self.config.node_timeout.as_millis() as u64,
                        "replica read timed out, skipping node"
                    );
                }
            }
        }

        self.stats.record_miss();
        self.stats.record_response_time(started.elapsed());
        None
    }

    /// Typed lookup through the serialization boundary
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await {
            Some(raw) => decode_value(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Cache-aside promotion after a remote hit
    fn promote(&self, key: &str, value: &Bytes, node_id: &str) {
        if !self.config.enable_local {
            return;
        }
        let entry = CacheEntry::new(key, value.clone(), self.config.promotion_ttl_seconds)
            .with_node_id(node_id);
        self.local.insert(entry);
        debug!(key, node_id, "promoted remote hit into local tier");
    }

    // =========================================================================
    // Write path
    // =========================================================================

    /// Store a value with the default TTL and no tags
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with(key, value, SetOptions::new()).await
    }

    /// Store a value with explicit TTL, tags, and dependencies.
    ///
    /// Serialization happens before any write is attempted; an
    /// unserializable value fails fast with no partial state. The write
    /// succeeds per the configured [`WritePolicy`]; if every attempted
    /// location fails the caller gets [`Error::AllReplicasFailed`].
    pub async fn set_with<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        opts: SetOptions,
    ) -> Result<()> {
        let raw = encode_value(key, value)?;
        self.set_bytes(key, raw, opts).await
    }

    /// Store an already serialized value
    pub async fn set_bytes(&self, key: &str, value: Bytes, opts: SetOptions) -> Result<()> {
        let ttl = opts.ttl_seconds.unwrap_or(self.config.default_ttl_seconds);
        let version = self
            .local
            .peek(key)
            .map(|existing| existing.version + 1)
            .unwrap_or(1);

        let entry = CacheEntry::new(key, value, ttl)
            .with_tags(opts.tags.clone())
            .with_dependencies(opts.dependencies.clone())
            .with_version(version);

        let local_ok = if self.config.enable_local {
            self.local.insert(entry.clone());
            true
        } else {
            false
        };

        let replicas = self.active_replicas(key);
        let remote_acks = if replicas.is_empty() {
            0
        } else {
            self.replicate(entry, &replicas).await
        };

        match self.config.write_policy {
            WritePolicy::Quorum if !replicas.is_empty() => {
                let required = self.config.write_policy.required_acks(self.config.replication_factor);
                if remote_acks < required {
                    return Err(Error::QuorumNotReached {
                        key: key.to_string(),
                        acked: remote_acks,
                        required,
                    });
                }
            }
            _ => {
                if !local_ok && (replicas.is_empty() || remote_acks == 0) {
                    return Err(Error::AllReplicasFailed {
                        key: key.to_string(),
                    });
                }
            }
        }

        if !opts.tags.is_empty() {
            self.tags.register(key, opts.tags);
        }
        if !opts.dependencies.is_empty() {
            self.deps.register(key, opts.dependencies);
        }
        self.stats.record_set();
        Ok(())
    }

    /// Fan a write out to the replica set concurrently. Worst-case latency
    /// is bounded by the slowest responder within its own timeout, not the
    /// sum of replica latencies. Returns the number of acknowledgements.
    async fn replicate(&self, entry: CacheEntry, replicas: &[String]) -> usize {
        let writes = replicas.iter().filter_map(|node_id| {
            let node = self.registry.get(node_id)?;
            let entry = entry.clone();
            let transport = Arc::clone(&self.transport);
            let budget = self.config.node_timeout;
            Some(async move {
                let result = timeout(budget, async {
                    transport.remote_set(&node, &entry.key, &entry).await
                })
                .await;
                (node.id.clone(), result)
            })
        });

        let mut acks = 0usize;
        for (node_id, result) in join_all(writes).await {
            match result {
                Ok(Ok(true)) => acks += 1,
                Ok(Ok(false)) => {
                    warn!(node_id = %node_id, "replica refused write");
                }
                Ok(Err(err)) => {
                    self.stats.record_remote_error();
                    warn!(node_id = %node_id, error = %err, "replica write failed");
                }
                Err(_) => {
                    self.stats.record_remote_error();
                    warn!(node_id = %node_id, "replica write timed out");
                }
            }
        }
        acks
    }

    // =========================================================================
    // Delete & invalidation
    // =========================================================================

    /// Remove a key from the local tier and from every node in its replica
    /// set, and purge it from the invalidation indices. Returns true if it
    /// was removed from at least one location.
    pub async fn delete(&self, key: &str) -> bool {
        let local_removed = self.local.remove(key).is_some();

        let replicas = self.active_replicas(key);
        let deletes = replicas.iter().filter_map(|node_id| {
            let node = self.registry.get(node_id)?;
            let transport = Arc::clone(&self.transport);
            let budget = self.config.node_timeout;
            let key = key.to_string();
            Some(async move {
                matches!(
                    timeout(budget, transport.remote_delete(&node, &key)).await,
                    Ok(Ok(true))
                )
            })
        });
        let remote_removed = join_all(deletes).await.into_iter().any(|removed| removed);

        self.tags.remove_key(key);
        self.deps.remove_key(key);
        self.warmed.write().remove(key);
        self.stats.record_delete();

        local_removed || remote_removed
    }

    /// Delete every key registered under any of the given tags, then clear
    /// those tag registrations. Returns the number of keys deleted.
    pub async fn invalidate_by_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut victims: HashSet<String> = HashSet::new();
        for tag in tags {
            victims.extend(self.tags.take(tag.as_ref()));
        }

        let mut deleted = 0usize;
        for key in victims {
            if self.delete(&key).await {
                deleted += 1;
            }
        }
        self.stats.record_invalidations(deleted as u64);
        deleted
    }

    /// Delete every local-tier key whose name matches the regex. Remote key
    /// enumeration is out of scope, so matching is local-only by design.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> Result<usize> {
        let re = regex::Regex::new(pattern)?;

        let matches: Vec<String> = self
            .local
            .keys()
            .into_iter()
            .filter(|key| re.is_match(key))
            .collect();

        let mut deleted = 0usize;
        for key in matches {
            if self.delete(&key).await {
                deleted += 1;
            }
        }
        self.stats.record_invalidations(deleted as u64);
        Ok(deleted)
    }

    /// Delete every key directly registered as dependent on the given key.
    /// One hop only: dependents of the deleted keys are not cascaded into.
    pub async fn invalidate_dependencies(&self, dependency_key: &str) -> usize {
        let dependents = self.deps.take(dependency_key);

        let mut deleted = 0usize;
        for key in dependents {
            if self.delete(&key).await {
                deleted += 1;
            }
        }
        self.stats.record_invalidations(deleted as u64);
        deleted
    }

    // =========================================================================
    // Warming
    // =========================================================================

    /// Populate the cache from an externally supplied loader, one bounded
    /// batch per pattern. Warmed keys are tracked separately from
    /// organically populated entries. A failing pattern is logged and
    /// skipped; the remaining patterns still run.
    pub async fn warm_cache<I, S>(&self, patterns: I, loader: &dyn CacheLoader) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut warmed = 0usize;

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let batch = match loader.load(pattern).await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(pattern, error = %err, "warm loader failed, skipping pattern");
                    continue;
                }
            };

            for (key, value) in batch.into_iter().take(self.config.warm_batch_limit) {
                match self.set_bytes(&key, value, SetOptions::new()).await {
                    Ok(()) => {
                        self.warmed.write().insert(key);
                        warmed += 1;
                    }
                    Err(err) => {
                        warn!(key = %key, error = %err, "warm write failed");
                    }
                }
            }
            debug!(pattern, "warming pattern complete");
        }

        warmed
    }

    /// Whether a key was populated by warming rather than organically
    pub fn is_warmed(&self, key: &str) -> bool {
        self.warmed.read().contains(key)
    }

    /// Number of keys populated by warming
    pub fn warmed_count(&self) -> usize {
        self.warmed.read().len()
    }

    // =========================================================================
    // Health & stats
    // =========================================================================

    /// Health summary for external monitoring
    pub fn health_check(&self) -> HealthReport {
        let max = self.local.max_bytes();
        let utilization = if max == 0 {
            0.0
        } else {
            self.local.used_bytes() as f64 / max as f64 * 100.0
        };

        HealthReport {
            hit_rate_percent: self.stats.hit_rate() * 100.0,
            memory_utilization_percent: utilization,
            active_nodes: self.registry.active_count(),
            total_nodes: self.registry.total_count(),
            avg_response_time_ms: self.stats.avg_response_time().as_secs_f64() * 1000.0,
            warmed_keys: self.warmed_count(),
        }
    }

    /// Point-in-time counter snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(
            self.local.evictions(),
            self.local.used_bytes(),
            self.local.max_bytes(),
        )
    }

    /// Number of entries in the local tier
    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    /// Whether the local tier holds a key (without touching access stats)
    pub fn contains_local(&self, key: &str) -> bool {
        self.local.contains(key)
    }

    /// Drop all local state: entries, indices, warmed set, and counters.
    /// Remote keyspaces are untouched.
    pub fn clear(&self) {
        self.local.clear();
        self.tags.clear();
        self.deps.clear();
        self.warmed.write().clear();
        self.stats.reset();
    }
}

// =============================================================================
// Tests
// =============================================================================
