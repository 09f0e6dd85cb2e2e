//! Cache Configuration
//!
//! All tunables live in an explicit config struct injected at manager
//! construction, so independently configured instances can coexist.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::EvictionStrategy;

/// Replication success policy for `set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Availability-biased: the write succeeds once any one location
    /// (local tier or any replica) has accepted it
    AnyOne,
    /// Consistency-biased: the write succeeds only once a majority of the
    /// replica set has acknowledged it
    Quorum,
}

impl WritePolicy {
    /// Remote acknowledgements required for a given replication factor
    pub fn required_acks(&self, replication_factor: usize) -> usize {
        match self {
            WritePolicy::AnyOne => 1,
            WritePolicy::Quorum => (replication_factor + 2) / 2,
        }
    }
}

/// Manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Byte budget for the local tier
    pub max_local_bytes: u64,
    /// Victim-selection strategy for local eviction
    pub eviction: EvictionStrategy,
    /// Distinct nodes that should hold a copy of each key
    pub replication_factor: usize,
    /// Virtual ring positions per physical node
    pub virtual_nodes: usize,
    /// Replication success policy
    pub write_policy: WritePolicy,
    /// TTL applied when the caller does not pass one; <= 0 means no expiry
    pub default_ttl_seconds: i64,
    /// Short TTL for entries promoted into the local tier after a remote hit
    pub promotion_ttl_seconds: i64,
    /// Per-remote-call latency budget
    pub node_timeout: Duration,
    /// Route to remote replicas at all
    pub enable_distributed: bool,
    /// Keep a local tier at all
    pub enable_local: bool,
    /// Cap on entries accepted from the loader per warming pattern
    pub warm_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_local_bytes: 64 * 1024 * 1024, // 64MB
            eviction: EvictionStrategy::default(),
            replication_factor: 2,
            virtual_nodes: crate::ring::DEFAULT_VIRTUAL_NODES,
            write_policy: WritePolicy::AnyOne,
            default_ttl_seconds: 0,
            promotion_ttl_seconds: 300, // 5 minutes
            node_timeout: Duration::from_millis(150),
            enable_distributed: true,
            enable_local: true,
            warm_batch_limit: 1000,
        }
    }
}

impl CacheConfig {
    /// Local-only configuration: no ring, no remote fan-out
    pub fn local_only() -> Self {
        Self {
            enable_distributed: false,
            ..Self::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.replication_factor, 2);
        assert_eq!(config.virtual_nodes, 150);
        assert_eq!(config.write_policy, WritePolicy::AnyOne);
        assert!(config.enable_local);
        assert!(config.enable_distributed);
    }

    #[test]
    fn test_local_only() {
        let config = CacheConfig::local_only();
        assert!(!config.enable_distributed);
        assert!(config.enable_local);
    }

    #[test]
    fn test_quorum_required_acks() {
        assert_eq!(WritePolicy::AnyOne.required_acks(3), 1);
        // W = ceil((RF + 1) / 2)
        assert_eq!(WritePolicy::Quorum.required_acks(1), 1);
        assert_eq!(WritePolicy::Quorum.required_acks(2), 2);
        assert_eq!(WritePolicy::Quorum.required_acks(3), 2);
        assert_eq!(WritePolicy::Quorum.required_acks(4), 3);
        assert_eq!(WritePolicy::Quorum.required_acks(5), 3);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = CacheConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.replication_factor, config.replication_factor);
        assert_eq!(back.node_timeout, config.node_timeout);
    }
}
