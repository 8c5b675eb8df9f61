// crates/todo-tracks-server/src/cache.rs
// Per-repository memoization with at most one computation in flight per key

use crate::error::Result;
use crate::pattern::ExcludeSet;
use crate::tree::RevisionTree;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use todo_tracks_types::{BlobId, MarkerLine, Revision};
use tokio::sync::OnceCell;
use tracing::debug;

/// Key -> result store shared by every task of one repository handle.
///
/// A slot is claimed under the map lock and computed outside it, so callers
/// for different keys never wait on each other while callers for the same key
/// share one computation. Failed computations leave the slot empty and the
/// next caller retries.
pub struct MemoCache<K, V> {
    name: &'static str,
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &K) -> Arc<OnceCell<V>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.clone()).or_default().clone()
    }

    /// Return the cached value for `key`, running `compute` if none exists yet
    pub async fn get_or_compute<F, Fut>(&self, key: &K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let slot = self.slot(key);
        if let Some(value) = slot.get() {
            return Ok(value.clone());
        }
        let value = slot
            .get_or_try_init(|| async move {
                debug!(cache = self.name, "computing");
                compute().await
            })
            .await?;
        Ok(value.clone())
    }

    /// Completed value for `key`, without computing
    pub fn get(&self, key: &K) -> Option<V> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of completed entries
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Revision-level cache key: the same revision aggregated under different
/// exclusion sets yields different results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionKey {
    pub revision: Revision,
    pub excludes: String,
}

impl RevisionKey {
    pub fn new(revision: &Revision, excludes: &ExcludeSet) -> Self {
        Self {
            revision: revision.clone(),
            excludes: excludes.key().to_string(),
        }
    }
}

/// All caches owned by one repository handle
pub struct RepoCaches {
    pub trees: MemoCache<Revision, Arc<RevisionTree>>,
    pub blobs: MemoCache<BlobId, Arc<Vec<MarkerLine>>>,
    pub revisions: MemoCache<RevisionKey, Arc<Vec<MarkerLine>>>,
}

impl RepoCaches {
    pub fn new() -> Self {
        Self {
            trees: MemoCache::new("trees"),
            blobs: MemoCache::new("blobs"),
            revisions: MemoCache::new("revisions"),
        }
    }
}

impl Default for RepoCaches {
    fn default() -> Self {
        Self::new()
    }
}
