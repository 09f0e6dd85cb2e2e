//! Invalidation Indices
//!
//! Auxiliary indices enabling cascading invalidation: `tag -> keys` for
//! tag-based invalidation and `dependency -> dependent keys` for one-hop
//! dependency invalidation. Both keep reverse bookkeeping so deleting a key
//! purges it from every bucket it participates in, and buckets are pruned
//! when their last member is removed.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

/// Bidirectional label -> keys index.
///
/// One instance serves as the tag index (`tag -> cache keys`), another as the
/// dependency graph (`dependency key -> dependent cache keys`).
#[derive(Debug, Default)]
pub struct KeyIndex {
    /// label -> member keys
    forward: RwLock<HashMap<String, HashSet<String>>>,
    /// key -> labels it is registered under
    reverse: RwLock<HashMap<String, HashSet<String>>>,
}

impl KeyIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key under a set of labels
    pub fn register<I, S>(&self, key: &str, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return;
        }

        let mut forward = self.forward.write();
        let mut reverse = self.reverse.write();
        for label in labels {
            forward
                .entry(label.clone())
                .or_default()
                .insert(key.to_string());
            reverse.entry(key.to_string()).or_default().insert(label);
        }
    }

    /// Purge a key from every bucket it participates in
    pub fn remove_key(&self, key: &str) {
        let mut forward = self.forward.write();
        let mut reverse = self.reverse.write();

        if let Some(labels) = reverse.remove(key) {
            for label in labels {
                let emptied = forward
                    .get_mut(&label)
                    .map(|members| {
                        members.remove(key);
                        members.is_empty()
                    })
                    .unwrap_or(false);
                if emptied {
                    forward.remove(&label);
                }
            }
        }
    }

    /// Remove a label's bucket and return its members, clearing the reverse
    /// registrations as well
    pub fn take(&self, label: &str) -> Vec<String> {
        let mut forward = self.forward.write();
        let mut reverse = self.reverse.write();

        let Some(members) = forward.remove(label) else {
            return Vec::new();
        };

        for key in &members {
            let emptied = reverse
                .get_mut(key)
                .map(|labels| {
                    labels.remove(label);
                    labels.is_empty()
                })
                .unwrap_or(false);
            if emptied {
                reverse.remove(key);
            }
        }

        members.into_iter().collect()
    }

    /// Members currently registered under a label
    pub fn keys_for(&self, label: &str) -> Vec<String> {
        self.forward
            .read()
            .get(label)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Labels a key is registered under
    pub fn labels_for(&self, key: &str) -> Vec<String> {
        self.reverse
            .read()
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of label buckets
    pub fn label_count(&self) -> usize {
        self.forward.read().len()
    }

    /// Drop all registrations
    pub fn clear(&self) {
        self.forward.write().clear();
        self.reverse.write().clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
