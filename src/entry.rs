//! Cache Entry Types
//!
//! The stored record plus its metadata: TTL, tags, dependencies, access
//! statistics, and the size of the serialized payload.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Current time as epoch seconds
#[inline]
pub(crate) fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Encode a value through the serialization boundary.
///
/// Size accounting always derives from the serialized form, never from the
/// in-memory representation. Fails fast with [`Error::Serialization`] so no
/// partial writes can happen downstream.
pub fn encode_value<T: Serialize>(key: &str, value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Error::serialization(key, e))
}

/// Decode a value back out of its serialized form
pub fn decode_value<T: DeserializeOwned>(key: &str, raw: &Bytes) -> Result<T> {
    serde_json::from_slice(raw).map_err(|e| Error::deserialization(key, e))
}

/// A single cached record with metadata
#[derive(Debug)]
pub struct CacheEntry {
    /// Cache key
    pub key: String,
    /// Serialized payload
    pub value: Bytes,
    /// TTL in seconds; zero or negative means the entry never expires
    pub ttl_seconds: i64,
    /// Creation timestamp (epoch seconds)
    pub created_at: u64,
    /// Last access timestamp (epoch seconds)
    accessed_at: AtomicU64,
    /// Access count for frequency-based eviction
    access_count: AtomicU64,
    /// Tier-assigned insertion sequence; breaks FIFO ties within one second
    created_seq: AtomicU64,
    /// Tier-assigned sequence of the most recent access; breaks LRU ties
    access_seq: AtomicU64,
    /// Size of the serialized payload in bytes
    pub size_bytes: u64,
    /// Owning replica when the entry was fetched from a remote node
    pub node_id: Option<String>,
    /// Bumped every time the key is overwritten
    pub version: u64,
    /// Logical labels for tag-based invalidation
    pub tags: HashSet<String>,
    /// Source-of-truth keys this entry was derived from
    pub dependencies: HashSet<String>,
}

impl CacheEntry {
    /// Create a new entry from an already serialized payload
    pub fn new(key: impl Into<String>, value: Bytes, ttl_seconds: i64) -> Self {
        let now = epoch_secs();
        let size = value.len() as u64;
        Self {
            key: key.into(),
            value,
            ttl_seconds,
            created_at: now,
            accessed_at: AtomicU64::new(now),
            access_count: AtomicU64::new(0),
            created_seq: AtomicU64::new(0),
            access_seq: AtomicU64::new(0),
            size_bytes: size,
            node_id: None,
            version: 1,
            tags: HashSet::new(),
            dependencies: HashSet::new(),
        }
    }

    /// Attach tags
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Attach dependencies
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = String>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }

    /// Set the owning replica id
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Record an access: refresh `accessed_at` and bump `access_count`
    #[inline]
    pub fn touch(&self) -> u64 {
        self.accessed_at.store(epoch_secs(), Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record an access with the tier's access sequence number
    #[inline]
    pub(crate) fn touch_with_seq(&self, seq: u64) -> u64 {
        self.access_seq.store(seq, Ordering::Relaxed);
        self.touch()
    }

    /// Assign the tier's insertion sequence number
    #[inline]
    pub(crate) fn set_created_seq(&self, seq: u64) {
        self.created_seq.store(seq, Ordering::Relaxed);
        // A never-read entry orders by its insertion point.
        self.access_seq.store(seq, Ordering::Relaxed);
    }

    /// Insertion sequence assigned by the local tier
    #[inline]
    pub(crate) fn created_seq(&self) -> u64 {
        self.created_seq.load(Ordering::Relaxed)
    }

    /// Sequence of the most recent access
    #[inline]
    pub(crate) fn access_seq(&self) -> u64 {
        self.access_seq.load(Ordering::Relaxed)
    }

    /// Last access timestamp (epoch seconds)
    #[inline]
    pub fn accessed_at(&self) -> u64 {
        self.accessed_at.load(Ordering::Relaxed)
    }

    /// Number of accesses since creation
    #[inline]
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// Check whether the entry has outlived its TTL.
    ///
    /// An entry is expired iff `ttl_seconds > 0` and more than `ttl_seconds`
    /// have elapsed since creation. Expiry is detected lazily on read; there
    /// is no background sweep.
    #[inline]
    pub fn is_expired(&self) -> bool {
        if self.ttl_seconds <= 0 {
            return false;
        }
        epoch_secs().saturating_sub(self.created_at) > self.ttl_seconds as u64
    }

    /// Age of the entry in hours
    #[inline]
    pub fn age_hours(&self) -> f64 {
        epoch_secs().saturating_sub(self.created_at) as f64 / 3600.0
    }
}

impl Clone for CacheEntry {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            ttl_seconds: self.ttl_seconds,
            created_at: self.created_at,
            accessed_at: AtomicU64::new(self.accessed_at.load(Ordering::Relaxed)),
            access_count: AtomicU64::new(self.access_count.load(Ordering::Relaxed)),
            created_seq: AtomicU64::new(self.created_seq.load(Ordering::Relaxed)),
            access_seq: AtomicU64::new(self.access_seq.load(Ordering::Relaxed)),
            size_bytes: self.size_bytes,
            node_id: self.node_id.clone(),
            version: self.version,
            tags: self.tags.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(key: &str, data: &[u8], ttl: i64) -> CacheEntry {
        CacheEntry::new(key, Bytes::copy_from_slice(data), ttl)
    }

    #[test]
    fn test_entry_creation() {
        let entry = make_entry("user:1", b"payload", 60);
        assert_eq!(entry.key, "user:1");
        assert_eq!(entry.size_bytes, 7);
        assert_eq!(entry.version, 1);
        assert_eq!(entry.access_count(), 0);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_never_expires_without_ttl() {
        let zero = make_entry("k", b"v", 0);
        let negative = make_entry("k", b"v", -5);
        assert!(!zero.is_expired());
        assert!(!negative.is_expired());
    }

    #[test]
    fn test_entry_access_tracking() {
        let entry = make_entry("k", b"v", 0);
        assert_eq!(entry.touch(), 1);
        assert_eq!(entry.touch(), 2);
        assert_eq!(entry.access_count(), 2);
        assert!(entry.accessed_at() >= entry.created_at);
    }

    #[test]
    fn test_entry_tags_and_dependencies() {
        let entry = make_entry("order:7", b"v", 0)
            .with_tags(vec!["orders".to_string(), "tenant:9".to_string()])
            .with_dependencies(vec!["customer:3".to_string()]);

        assert!(entry.tags.contains("orders"));
        assert!(entry.tags.contains("tenant:9"));
        assert!(entry.dependencies.contains("customer:3"));
    }

    #[test]
    fn test_entry_clone_preserves_counters() {
        let entry = make_entry("k", b"v", 0);
        entry.touch();
        entry.touch();

        let cloned = entry.clone();
        assert_eq!(cloned.access_count(), 2);
        assert_eq!(cloned.size_bytes, entry.size_bytes);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Payload {
            id: u32,
            name: String,
        }

        let payload = Payload {
            id: 7,
            name: "widget".to_string(),
        };

        let raw = encode_value("product:7", &payload).unwrap();
        assert!(!raw.is_empty());

        let decoded: Payload = decode_value("product:7", &raw).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_wrong_type_fails() {
        let raw = encode_value("k", &vec![1, 2, 3]).unwrap();
        let result: crate::error::Result<String> = decode_value("k", &raw);
        assert!(matches!(
            result,
            Err(crate::error::Error::Deserialization { .. })
        ));
    }
}
