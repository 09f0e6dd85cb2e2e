//! Consistent Hash Ring
//!
//! Maps cache keys to the physical node(s) that own them, stable under node
//! churn: adding or removing one physical node reassigns only the ring
//! segments that node owned, not the whole keyspace.
//!
//! Each physical node is inserted as `virtual_nodes` positions on the ring
//! (hash of `"{node_id}:{i}"`), which smooths load distribution across an
//! uneven hash space.

use std::collections::BTreeMap;
use std::collections::HashSet;

/// Default number of virtual positions per physical node
pub const DEFAULT_VIRTUAL_NODES: usize = 150;

/// Fast non-cryptographic hash (FxHash algorithm)
#[inline]
pub(crate) fn ring_hash(bytes: &[u8]) -> u64 {
    const SEED: u64 = 0x517cc1b727220a95;
    let mut hash = SEED;
    for &byte in bytes {
        hash = hash.rotate_left(5) ^ (byte as u64);
        hash = hash.wrapping_mul(SEED);
    }
    hash
}

/// Sorted mapping from virtual ring position to physical node id
#[derive(Debug, Clone, Default)]
pub struct ConsistentHashRing {
    /// Virtual position -> physical node id
    ring: BTreeMap<u64, String>,
    /// Physical node ids currently on the ring
    nodes: HashSet<String>,
    /// Virtual positions per physical node
    virtual_nodes: usize,
}

impl ConsistentHashRing {
    /// Create an empty ring with the default replica count
    pub fn new() -> Self {
        Self::with_virtual_nodes(DEFAULT_VIRTUAL_NODES)
    }

    /// Create an empty ring with a custom virtual node count
    pub fn with_virtual_nodes(virtual_nodes: usize) -> Self {
        Self {
            ring: BTreeMap::new(),
            nodes: HashSet::new(),
            virtual_nodes: virtual_nodes.max(1),
        }
    }

    /// Insert all virtual positions for a physical node.
    ///
    /// Idempotent: re-adding a known node is a no-op.
    pub fn add_node(&mut self, node_id: &str) {
        if !self.nodes.insert(node_id.to_string()) {
            return;
        }
        for i in 0..self.virtual_nodes {
            let position = ring_hash(format!("{node_id}:{i}").as_bytes());
            self.ring.insert(position, node_id.to_string());
        }
    }

    /// Remove every virtual position belonging to a physical node
    pub fn remove_node(&mut self, node_id: &str) {
        if !self.nodes.remove(node_id) {
            return;
        }
        self.ring.retain(|_, owner| owner != node_id);
    }

    /// Node owning the first ring position at or after `hash(key)`,
    /// wrapping to the first position when none is greater. `None` on an
    /// empty ring.
    pub fn get_node(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let h = ring_hash(key.as_bytes());
        self.ring
            .range(h..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, id)| id.as_str())
    }

    /// Walk the ring clockwise from the primary position, collecting up to
    /// `count` distinct physical nodes. Virtual duplicates of an already
    /// collected node are skipped. Returns fewer than `count` ids when the
    /// cluster has fewer distinct nodes, and an empty vec when `count` is
    /// zero or the ring is empty.
    pub fn get_nodes_for_replication(&self, key: &str, count: usize) -> Vec<String> {
        self.replicas_filtered(key, count, |_| true)
    }

    /// Replication walk that only collects nodes passing the predicate.
    ///
    /// Used by the manager to scan past inactive nodes until `count` active
    /// distinct nodes are collected or the ring is exhausted.
    pub fn replicas_filtered<F>(&self, key: &str, count: usize, accept: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        if count == 0 || self.ring.is_empty() {
            return Vec::new();
        }

        let h = ring_hash(key.as_bytes());
        let mut replicas: Vec<String> = Vec::with_capacity(count);

        for (_, node_id) in self.ring.range(h..).chain(self.ring.range(..h)) {
            if replicas.iter().any(|r| r == node_id) {
                continue;
            }
            if !accept(node_id) {
                continue;
            }
            replicas.push(node_id.clone());
            if replicas.len() == count {
                break;
            }
        }

        replicas
    }

    /// Number of distinct physical nodes on the ring
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the ring has no nodes
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether a physical node is on the ring
    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    /// Distinct physical node ids on the ring
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ring_with(nodes: &[&str]) -> ConsistentHashRing {
        let mut ring = ConsistentHashRing::new();
        for node in nodes {
            ring.add_node(node);
        }
        ring
    }

    #[test]
    fn test_empty_ring() {
        let ring = ConsistentHashRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.get_node("anything"), None);
        assert!(ring.get_nodes_for_replication("anything", 3).is_empty());
    }

    #[test]
    fn test_single_node_owns_everything() {
        let ring = ring_with(&["node-a"]);
        for i in 0..100 {
            assert_eq!(ring.get_node(&format!("key-{i}")), Some("node-a"));
        }
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut ring = ring_with(&["node-a"]);
        ring.add_node("node-a");
        assert_eq!(ring.node_count(), 1);
    }

    #[test]
    fn test_remove_unknown_node_is_noop() {
        let mut ring = ring_with(&["node-a"]);
        ring.remove_node("node-b");
        assert_eq!(ring.node_count(), 1);
    }

    #[test]
    fn test_replication_returns_distinct_nodes() {
        let ring = ring_with(&["node-a", "node-b", "node-c", "node-d", "node-e"]);

        for i in 0..200 {
            let replicas = ring.get_nodes_for_replication(&format!("key-{i}"), 3);
            assert_eq!(replicas.len(), 3);
            let distinct: std::collections::HashSet<_> = replicas.iter().collect();
            assert_eq!(distinct.len(), 3);
        }
    }

    #[test]
    fn test_replication_bounded_by_cluster_size() {
        let ring = ring_with(&["node-a", "node-b"]);
        let replicas = ring.get_nodes_for_replication("key", 5);
        assert_eq!(replicas.len(), 2);
    }

    #[test]
    fn test_replication_zero_count() {
        let ring = ring_with(&["node-a"]);
        assert!(ring.get_nodes_for_replication("key", 0).is_empty());
    }

    #[test]
    fn test_replication_primary_matches_get_node() {
        let ring = ring_with(&["node-a", "node-b", "node-c"]);
        for i in 0..100 {
            let key = format!("key-{i}");
            let primary = ring.get_node(&key).unwrap().to_string();
            let replicas = ring.get_nodes_for_replication(&key, 2);
            assert_eq!(replicas[0], primary);
        }
    }

    #[test]
    fn test_filtered_walk_skips_rejected_nodes() {
        let ring = ring_with(&["node-a", "node-b", "node-c"]);
        let replicas = ring.replicas_filtered("key", 2, |id| id != "node-b");
        assert_eq!(replicas.len(), 2);
        assert!(!replicas.contains(&"node-b".to_string()));
    }

    #[test]
    fn test_ring_stability_on_node_removal() {
        // Removing one of 5 nodes must remap roughly a fifth of the
        // keyspace, never all of it. Keys not owned by the removed node
        // keep their primary exactly.
        let nodes = ["node-a", "node-b", "node-c", "node-d", "node-e"];
        let mut ring = ring_with(&nodes);

        let keys: Vec<String> = (0..1000).map(|i| format!("key-{i}")).collect();
        let before: Vec<(String, String)> = keys
            .iter()
            .map(|k| (k.clone(), ring.get_node(k).unwrap().to_string()))
            .collect();

        ring.remove_node("node-c");

        let mut remapped = 0usize;
        for (key, old_owner) in &before {
            let new_owner = ring.get_node(key).unwrap();
            if old_owner == "node-c" {
                assert_ne!(new_owner, "node-c");
                remapped += 1;
            } else {
                assert_eq!(new_owner, old_owner.as_str());
            }
        }

        // Expected ~200 of 1000; allow generous tolerance for hash skew.
        assert!(remapped > 0, "removal should remap some keys");
        assert!(
            remapped < 450,
            "removal remapped {remapped} of 1000 keys, expected ~200"
        );
    }

    #[test]
    fn test_distribution_is_roughly_even() {
        let nodes = ["node-a", "node-b", "node-c", "node-d", "node-e"];
        let ring = ring_with(&nodes);

        let mut counts: std::collections::HashMap<String, usize> =
            std::collections::HashMap::new();
        for i in 0..5000 {
            let owner = ring.get_node(&format!("key-{i}")).unwrap().to_string();
            *counts.entry(owner).or_default() += 1;
        }

        for node in &nodes {
            let share = counts.get(*node).copied().unwrap_or(0);
            assert!(
                share > 400,
                "node {node} owns only {share} of 5000 keys, distribution too skewed"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_lookup_is_deterministic(key in "[a-z0-9:/_-]{1,64}") {
            let ring = ring_with(&["node-a", "node-b", "node-c"]);
            let first = ring.get_node(&key).map(str::to_string);
            let second = ring.get_node(&key).map(str::to_string);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_removal_never_remaps_surviving_owners(
            keys in prop::collection::vec("[a-z0-9]{1,32}", 1..200),
            victim in 0usize..4,
        ) {
            let nodes = ["n0", "n1", "n2", "n3"];
            let mut ring = ring_with(&nodes);

            let before: Vec<Option<String>> =
                keys.iter().map(|k| ring.get_node(k).map(str::to_string)).collect();

            let removed = nodes[victim];
            ring.remove_node(removed);

            for (key, old_owner) in keys.iter().zip(before) {
                let old_owner = old_owner.unwrap();
                if old_owner != removed {
                    prop_assert_eq!(ring.get_node(key), Some(old_owner.as_str()));
                }
            }
        }
    }
}
