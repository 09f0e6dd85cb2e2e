//! CacheMesh - Distributed Multi-Level Cache Engine
//!
//! A cache engine that spreads entries across a cluster of nodes with a
//! consistent-hash ring, keeps a hot local tier in front of the remote
//! replicas, and supports tag, pattern, and dependency based invalidation.
//!
//! # Architecture
//!
//! ```text
//! DistributedCacheManager
//!   ├── LocalTier            (in-process, byte-budgeted, batched eviction)
//!   ├── ConsistentHashRing   (key -> replica set, 150 vnodes per node)
//!   ├── NodeRegistry         (membership + liveness)
//!   ├── KeyIndex x2          (tag and dependency invalidation)
//!   └── NodeTransport        (pluggable remote node I/O)
//! ```
//!
//! Reads are local-first: a local hit never touches the network, a remote
//! hit is promoted into the local tier with a short TTL, and a full miss is
//! `None` rather than an error. Writes replicate to N distinct nodes and
//! succeed per the configured [`WritePolicy`] (any-one-of-N by default,
//! majority quorum on request).
//!
//! # Modules
//!
//! - [`config`] - Engine configuration and write policies
//! - [`entry`] - Cache entries and the serialization boundary
//! - [`error`] - Error types
//! - [`index`] - Tag and dependency indices
//! - [`local`] - The in-process tier with batched eviction
//! - [`manager`] - The orchestrating cache manager
//! - [`node`] - Node descriptors and the membership registry
//! - [`policy`] - Eviction strategies and victim scoring
//! - [`ring`] - The consistent-hash ring
//! - [`stats`] - Counters, health reports, and stats snapshots
//! - [`transport`] - The remote node transport trait and in-memory fake
//!
//! # Example
//!
//! ```no_run
//! use cachemesh::{CacheConfig, CacheNode, DistributedCacheManager, SetOptions};
//!
//! # async fn demo() -> cachemesh::Result<()> {
//! let cache = DistributedCacheManager::in_memory(CacheConfig::default());
//! cache.add_node(CacheNode::new("node-a", "10.0.0.1", 6379));
//! cache.add_node(CacheNode::new("node-b", "10.0.0.2", 6379));
//!
//! cache
//!     .set_with("user:42", &"alice", SetOptions::new().ttl(600).tags(["users"]))
//!     .await?;
//!
//! let _name: Option<String> = cache.get_as("user:42").await?;
//! cache.invalidate_by_tags(["users"]).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod index;
pub mod local;
pub mod manager;
pub mod node;
pub mod policy;
pub mod ring;
pub mod stats;
pub mod transport;

// Re-export commonly used types
pub use config::{CacheConfig, WritePolicy};
pub use entry::CacheEntry;
pub use error::{Error, Result};
pub use manager::{CacheLoader, DistributedCacheManager, SetOptions};
pub use node::CacheNode;
pub use policy::EvictionStrategy;
pub use ring::ConsistentHashRing;
pub use stats::{HealthReport, StatsSnapshot};
pub use transport::{InMemoryTransport, NodeTransport};
