// crates/todo-tracks-server/src/tree.rs
// Parsed file tree of a revision, memoized per revision

use crate::cache::RepoCaches;
use crate::error::{Result, TrackError};
use crate::git::VcsBackend;
use crate::git::parse::{self, TreeEntry};
use std::collections::HashMap;
use std::sync::Arc;
use todo_tracks_types::{BlobId, Revision};

/// Every blob path at one revision, in listing order
#[derive(Debug, Clone)]
pub struct RevisionTree {
    revision: Revision,
    entries: Vec<TreeEntry>,
    index: HashMap<String, usize>,
}

impl RevisionTree {
    pub fn from_listing(revision: &Revision, listing: &str) -> Result<Self> {
        let entries = parse::parse_tree(listing)?;
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.path.clone(), i))
            .collect();
        Ok(Self {
            revision: revision.clone(),
            entries,
            index,
        })
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn blob(&self, path: &str) -> Option<&BlobId> {
        self.index.get(path).map(|&i| &self.entries[i].blob)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves (revision, path) pairs to blobs through the tree cache
#[derive(Clone)]
pub struct TreeIndex {
    backend: Arc<dyn VcsBackend>,
    caches: Arc<RepoCaches>,
}

impl TreeIndex {
    pub fn new(backend: Arc<dyn VcsBackend>, caches: Arc<RepoCaches>) -> Self {
        Self { backend, caches }
    }

    pub async fn tree(&self, revision: &Revision) -> Result<Arc<RevisionTree>> {
        self.caches
            .trees
            .get_or_compute(revision, || async {
                let listing = self.backend.list_tree(revision).await?;
                Ok(Arc::new(RevisionTree::from_listing(revision, &listing)?))
            })
            .await
    }

    /// Blob for a path the caller expects to exist; a miss is an internal error
    pub async fn blob_for(&self, revision: &Revision, path: &str) -> Result<BlobId> {
        let tree = self.tree(revision).await?;
        tree.blob(path)
            .cloned()
            .ok_or_else(|| TrackError::BlobNotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            })
    }
}
