//! Node Transport
//!
//! The wire protocol used to talk to a remote cache node is abstracted behind
//! this trait; Redis, Memcached, or gRPC adapters live outside the engine.
//! The crate ships an in-memory implementation which serves as the reference
//! adapter and as the test double, with per-node fault and latency injection
//! for resilience scenarios.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};

use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::node::CacheNode;

/// Transport boundary between the manager and one backing store node
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Fetch the serialized value for a key from a node. `Ok(None)` means
    /// the node answered but does not hold a live copy.
    async fn remote_get(&self, node: &CacheNode, key: &str) -> Result<Option<Bytes>>;

    /// Store an entry on a node. `Ok(false)` means the node refused the
    /// write without failing.
    async fn remote_set(&self, node: &CacheNode, key: &str, entry: &CacheEntry) -> Result<bool>;

    /// Remove a key from a node, reporting whether anything was removed
    async fn remote_delete(&self, node: &CacheNode, key: &str) -> Result<bool>;
}

/// In-memory transport backing store, one keyspace per node id
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    /// node id -> key -> stored entry
    stores: DashMap<String, DashMap<String, CacheEntry>>,
    /// Nodes currently simulated as unreachable
    down: DashSet<String>,
    /// Artificial per-node response delay
    delays: DashMap<String, Duration>,
}

impl InMemoryTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a node outage: every call to it fails
    pub fn set_down(&self, node_id: &str, down: bool) {
        if down {
            self.down.insert(node_id.to_string());
        } else {
            self.down.remove(node_id);
        }
    }

    /// Add artificial latency to every call to a node
    pub fn set_delay(&self, node_id: &str, delay: Duration) {
        self.delays.insert(node_id.to_string(), delay);
    }

    /// Number of keys held for a node
    pub fn entry_count(&self, node_id: &str) -> usize {
        self.stores.get(node_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Whether a node holds a copy of a key (live or expired)
    pub fn holds(&self, node_id: &str, key: &str) -> bool {
        self.stores
            .get(node_id)
            .map(|s| s.contains_key(key))
            .unwrap_or(false)
    }

    async fn checkpoint(&self, node: &CacheNode) -> Result<()> {
        if self.down.contains(&node.id) {
            return Err(Error::NodeUnavailable {
                node_id: node.id.clone(),
                reason: "simulated outage".to_string(),
            });
        }
        if let Some(delay) = self.delays.get(&node.id).map(|d| *d) {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl NodeTransport for InMemoryTransport {
    async fn remote_get(&self, node: &CacheNode, key: &str) -> Result<Option<Bytes>> {
        self.checkpoint(node).await?;

        let Some(store) = self.stores.get(&node.id) else {
            return Ok(None);
        };

        let result = match store.get(key) {
            Some(entry) if entry.is_expired() => {
                drop(entry);
                store.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        };
        result
    }

    async fn remote_set(&self, node: &CacheNode, key: &str, entry: &CacheEntry) -> Result<bool> {
        self.checkpoint(node).await?;

        let store = self.stores.entry(node.id.clone()).or_default();
        let mut stored = entry.clone();
        stored.node_id = Some(node.id.clone());
        store.insert(key.to_string(), stored);
        Ok(true)
    }

    async fn remote_delete(&self, node: &CacheNode, key: &str) -> Result<bool> {
        self.checkpoint(node).await?;

        Ok(self
            .stores
            .get(&node.id)
            .and_then(|s| s.remove(key))
            .is_some())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn make_node(id: &str) -> CacheNode {
        CacheNode::new(id, "127.0.0.1", 7000)
    }

    fn make_entry(key: &str, data: &[u8], ttl: i64) -> CacheEntry {
        CacheEntry::new(key, Bytes::copy_from_slice(data), ttl)
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let transport = InMemoryTransport::new();
        let node = make_node("node-1");

        let ok = transport
            .remote_set(&node, "k", &make_entry("k", b"value", 0))
            .await
            .unwrap();
        assert!(ok);

        let got = transport.remote_get(&node, "k").await.unwrap();
        assert_eq!(got, Some(Bytes::from_static(b"value")));
    }

    #[tokio::test]
    async fn test_keyspaces_are_per_node() {
        let transport = InMemoryTransport::new();
        let a = make_node("node-a");
        let b = make_node("node-b");

        transport
            .remote_set(&a, "k", &make_entry("k", b"v", 0))
            .await
            .unwrap();

        assert!(transport.remote_get(&b, "k").await.unwrap().is_none());
        assert_eq!(transport.entry_count("node-a"), 1);
        assert_eq!(transport.entry_count("node-b"), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let transport = InMemoryTransport::new();
        let node = make_node("node-1");

        transport
            .remote_set(&node, "k", &make_entry("k", b"v", 0))
            .await
            .unwrap();

        assert!(transport.remote_delete(&node, "k").await.unwrap());
        assert!(!transport.remote_delete(&node, "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_not_served() {
        let transport = InMemoryTransport::new();
        let node = make_node("node-1");

        let mut entry = make_entry("k", b"v", 1);
        entry.created_at -= 60;
        transport.remote_set(&node, "k", &entry).await.unwrap();

        assert!(transport.remote_get(&node, "k").await.unwrap().is_none());
        assert!(!transport.holds("node-1", "k"));
    }

    #[tokio::test]
    async fn test_down_node_fails_calls() {
        let transport = InMemoryTransport::new();
        let node = make_node("node-1");
        transport.set_down("node-1", true);

        let err = transport.remote_get(&node, "k").await.unwrap_err();
        assert_matches!(err, Error::NodeUnavailable { .. });

        transport.set_down("node-1", false);
        assert!(transport.remote_get(&node, "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delay_injection() {
        let transport = InMemoryTransport::new();
        let node = make_node("node-1");
        transport.set_delay("node-1", Duration::from_millis(30));

        let start = std::time::Instant::now();
        transport.remote_get(&node, "k").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
